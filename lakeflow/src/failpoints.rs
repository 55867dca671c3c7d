use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, FlowError, FlowResult};

pub const EXTRACT_TABLE__BEFORE_FETCH: &str = "extract_table.before_fetch";
pub const WRITE_BATCH__BEFORE_PERSIST: &str = "write_batch.before_persist";

pub fn flow_fail_point(name: &str) -> FlowResult<()> {
    fail_point!(name, |parameter| {
        let mut error_kind = ErrorKind::SourceUnavailable;
        if let Some(parameter) = parameter {
            error_kind = match parameter.as_str() {
                "source_unavailable" => ErrorKind::SourceUnavailable,
                "batch_write_failed" => ErrorKind::BatchWriteFailed,
                _ => ErrorKind::SourceUnavailable,
            }
        }

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
