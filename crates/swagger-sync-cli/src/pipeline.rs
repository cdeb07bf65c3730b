//! Output variables for CI pipelines.

use std::io::{self, Write};

/// Variable carrying every link as a quoted `"KEY=value"` list for build
/// scripts.
pub const CICD_SCRIPT_VARIABLE: &str = "AZURE_CICD_SCRIPT";

/// The same variable in Azure Pipelines and GitHub Actions syntax.
pub fn variable_lines(key: &str, value: &str) -> [String; 2] {
    [
        format!("##vso[task.setvariable variable={key}]{value}"),
        format!("::set-output name={key}::{value}"),
    ]
}

pub fn emit_variable(out: &mut impl Write, key: &str, value: &str) -> io::Result<()> {
    for line in variable_lines(key, value) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// `"A=x" "B=y"`
pub fn cicd_script(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("\"{key}={value}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
