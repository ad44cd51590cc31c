use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = droplet::run() {
        let kind = e.kind();
        let report = anyhow::Error::new(e).context(format!("droplet command failed ({})", kind));
        eprintln!("Error: {:#}", report);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
