use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::constants::exit_codes;
use crate::errors::{ExecuteError, StepError};
use crate::managers::executor::{ConnectionIdentity, SshCommandExecutor};
use crate::services::arguments::StandardArgumentProvider;
use crate::services::command::{Command, RunrepCommandBuilder};
use crate::services::logger::Logger;

/// Options collected from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub overwrite: bool,
    /// Leave the report on the server after fetching it.
    pub keep_remote: bool,
}

/// Runs one pipeline step end to end: build the runrep script, execute it,
/// fetch the report to a local file, then clean up the remote artifact.
/// Returns the process exit code; Geneva (business) failures exit differently
/// from transport failures so an outer pipeline can route them.
pub fn run(options: &RunOptions) -> i32 {
    let logger = Logger::new("geneva-runner");
    match run_pipeline(options, &logger) {
        Ok(copied) => {
            logger.info(
                "report retrieved",
                Some(&serde_json::json!({
                    "local_path": options.output_path.display().to_string(),
                    "bytes": copied,
                })),
            );
            exit_codes::SUCCESS
        }
        Err(ExecuteError::Geneva(err)) => {
            logger.error(&err.detailed_report(), None);
            exit_codes::GENEVA_FAILURE
        }
        Err(ExecuteError::Transport(err)) => {
            let meta = err
                .hint
                .as_ref()
                .map(|hint| serde_json::json!({ "hint": hint }));
            logger.error(&err.to_string(), meta.as_ref());
            exit_codes::FAILURE
        }
    }
}

fn run_pipeline(options: &RunOptions, logger: &Logger) -> Result<u64, ExecuteError> {
    let config = RunConfig::load(&options.config_path)?;
    let provider = StandardArgumentProvider::new(config.request.clone());
    let builder = RunrepCommandBuilder::new(config.request.kind, &provider);
    let command = builder.build()?;
    let identity = config.connection.identity();

    logger.info(
        "running report",
        Some(&serde_json::json!({
            "target": identity.describe(),
            "command": command.obfuscated_text(),
            "output_resource": command.output_resource(),
        })),
    );

    let mut executor =
        SshCommandExecutor::new(config.executor.settings(), logger.child("ssh"));
    executor.execute(&command, &identity)?;

    let copied = download_output(&mut executor, &command, &identity, options)?;

    if !options.keep_remote {
        // Best-effort cleanup; the report is already safe locally.
        if let Err(err) = executor.delete_output(&command, &identity) {
            logger.warn(
                &format!(
                    "Successfully ran runrep and got the content from `{}` but something \
                     went wrong while cleaning it up.",
                    command.output_resource()
                ),
                Some(&serde_json::json!({ "error": err.to_string() })),
            );
        }
    }

    executor.close();
    Ok(copied)
}

/// Streams the remote report into a temp sibling of the requested local path,
/// then renames it into place so a crashed run never leaves a half-written
/// report under the final name.
fn download_output(
    executor: &mut SshCommandExecutor,
    command: &Command,
    identity: &ConnectionIdentity,
    options: &RunOptions,
) -> Result<u64, ExecuteError> {
    let local: &Path = &options.output_path;
    if local.exists() && !options.overwrite {
        return Err(ExecuteError::Transport(
            StepError::conflict(format!("Local path already exists: {}", local.display()))
                .with_hint("Pass --overwrite to replace it."),
        ));
    }

    let tmp_path = local.with_extension(format!("tmp-{}", rand::random::<u32>()));
    let copied = executor.fetch(command, identity, |reader| {
        let mut tmp_file = fs::File::create(&tmp_path)
            .map_err(|err| StepError::internal(format!("Failed to create temp file: {}", err)))?;
        io::copy(reader, &mut tmp_file).map_err(|err| StepError::internal(err.to_string()))
    });

    let copied = match copied {
        Ok(copied) => copied,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }
    };

    fs::rename(&tmp_path, local).map_err(|err| {
        StepError::internal(format!("Failed to finalize download: {}", err))
    })?;
    Ok(copied)
}
