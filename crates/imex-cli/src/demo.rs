//! CSV デモ用の TaskHooks
//!
//! Import: counts data rows and rejects the file if any row has a different
//! number of columns than the header.
//! Export: writes `rows` synthetic order lines.

use std::io::{BufRead, BufReader, Read, Write};

use imex_core::domain::HookError;
use imex_core::ports::TaskHooks;
use imex_core::{BatchResult, TaskParam, TaskResult};
use serde_json::json;
use tracing::debug;

pub struct CsvDemoHooks {
    rows: u64,
    limit: Option<u64>,
    keep_staged: bool,
}

impl CsvDemoHooks {
    pub fn new(rows: u64, limit: Option<u64>) -> Self {
        Self {
            rows,
            limit,
            keep_staged: false,
        }
    }

    pub fn keep_staged(mut self, keep: bool) -> Self {
        self.keep_staged = keep;
        self
    }
}

impl TaskHooks for CsvDemoHooks {
    fn name(&self) -> &str {
        "csv-demo"
    }

    fn parse(&self, input: &mut dyn Read, param: &TaskParam) -> Result<TaskResult, HookError> {
        let mut lines = BufReader::new(input).lines();
        let Some(header) = lines.next().transpose()? else {
            return Ok(TaskResult::failed_with("empty file"));
        };
        let columns = header.split(',').count();

        let mut rows = 0u64;
        let mut malformed = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            rows += 1;
            if line.split(',').count() != columns {
                // 1-based, counting the header
                malformed.push(i + 2);
            }
        }

        debug!(rows, columns, user = %param.user.user_name, "parsed upload");
        if !malformed.is_empty() {
            return Ok(TaskResult::failed_with(format!(
                "{} malformed rows: {:?}",
                malformed.len(),
                malformed
            )));
        }

        Ok(TaskResult::done(BatchResult::empty().with_detail(json!({
            "rows": rows,
            "columns": columns,
            "mart": param.mart,
        }))))
    }

    fn write(&self, output: &mut dyn Write, param: &TaskParam) -> Result<(), HookError> {
        writeln!(output, "id,mart,amount")?;
        for id in 1..=self.rows {
            writeln!(output, "{id},{},{}.{:02}", param.mart, id * 7 % 1000, id % 100)?;
        }
        Ok(())
    }

    fn count_limit(&self) -> Option<u64> {
        self.limit
    }

    fn count(&self, _param: &TaskParam) -> Result<u64, HookError> {
        Ok(self.rows)
    }

    fn clear_station_resource(&self) -> bool {
        !self.keep_staged
    }
}
