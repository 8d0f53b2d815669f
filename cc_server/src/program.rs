//! Uploaded-program execution.
//!
//! An uploaded file runs as a child process with the working directory set
//! to its folder. The session's backend permission is released for the
//! duration of the run, because the program drives the robot through its
//! own client library.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use arm_cc::commands::{ProgramRun, FILE_DELETE};
use arm_cc::{CcError, ReplyCode};
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::dispatch::{Dispatcher, TOOL_NONE};
use crate::motion::{DEFAULT_OVERLAP, DEFAULT_ZONE, MDO_ALL};

impl Dispatcher {
    /// Entry point for `DT = 1` requests. The uploaded file is deleted
    /// when requested even if the run was refused.
    pub async fn run_program(&mut self, data: &str) -> ReplyCode {
        let request: ProgramRun = match serde_json::from_str(data) {
            Ok(request) => request,
            Err(e) => {
                warn!("session {}: bad program request: {}", self.session_id(), e);
                return ReplyCode::DataError;
            }
        };
        let code = if self.has_operation_permission() {
            match self.exec_program(&request).await {
                Ok(code) => code,
                Err(e) => {
                    warn!(
                        "session {}: program execution failed: {}",
                        self.session_id(),
                        e
                    );
                    ReplyCode::DataError
                }
            }
        } else {
            warn!(
                "session {}: program rejected, operation permission not held",
                self.session_id()
            );
            ReplyCode::OperationNoneError
        };
        if request.delete == FILE_DELETE {
            delete_program_dir(&request.path).await;
        }
        code
    }

    async fn exec_program(&mut self, request: &ProgramRun) -> Result<ReplyCode, CcError> {
        // Put the backend into a known state before handing control over.
        let driver = self.driver().clone();
        let _ = driver.wait_motion().await?;
        let _ = driver.change_tool(TOOL_NONE).await?;
        let _ = driver.set_look_ahead(false).await?;
        let _ = driver.set_pass_through(false).await?;
        let _ = driver.set_overlap(DEFAULT_OVERLAP).await?;
        let _ = driver.set_zone(DEFAULT_ZONE).await?;
        let _ = driver.disable_override(MDO_ALL).await?;
        // The program reconfigures the backend at will; the cached mode is
        // stale after it runs.
        self.ctx().motion.invalidate().await;

        let _ = driver.release_permission().await;

        let interpreter = self.ctx().config.program_interpreter.clone();
        let param = request.param.as_deref().unwrap_or("{}");
        let code = run(&interpreter, &request.path, param).await;

        match driver.acquire_permission().await? {
            Ok(_) => {}
            Err(fault) => {
                warn!(
                    "session {}: could not reclaim operation permission: {}",
                    self.session_id(),
                    fault
                );
                self.drop_operation_permission();
            }
        }
        Ok(code)
    }
}

/// Runs one program file to completion. Anything on stderr counts as a
/// program error.
async fn run(interpreter: &str, path: &str, param: &str) -> ReplyCode {
    info!("running program {}", path);
    let mut command = Command::new(interpreter);
    command
        .arg(path)
        .arg(param)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = Path::new(path).parent() {
        command.current_dir(dir);
    }
    let output = match command.output().await {
        Ok(output) => output,
        Err(e) => {
            error!("failed to launch program {}: {}", path, e);
            return ReplyCode::ProgramError;
        }
    };
    let code = if output.stderr.is_empty() {
        ReplyCode::Success
    } else {
        warn!(
            "program {} wrote diagnostics: {}",
            path,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        ReplyCode::ProgramError
    };
    // The program's client library fires an asynchronous motion abort on
    // shutdown; let it land before the session reclaims permission.
    sleep(Duration::from_secs(1)).await;
    code
}

/// Removes the directory containing an uploaded program file.
async fn delete_program_dir(path: &str) {
    if tokio::fs::metadata(path).await.is_err() {
        return;
    }
    if let Some(dir) = Path::new(path).parent() {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!("could not delete program directory {}: {}", dir.display(), e);
        }
    }
}
