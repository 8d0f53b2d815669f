use serde::{Deserialize, Serialize};

/// Flag value in `DEL` requesting deletion of the uploaded program's
/// directory after the run.
pub const FILE_DELETE: i32 = 1;

/// Program execution request payload (`DT = 1`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProgramRun {
    #[serde(rename = "PATH")]
    pub path: String,
    #[serde(rename = "DEL")]
    pub delete: i32,
    #[serde(rename = "PAR", default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}
