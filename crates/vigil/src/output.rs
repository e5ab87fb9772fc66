//! Output formatting: JSON or YAML, selected by `--output`.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render any serde-serializable value in the chosen format.
pub fn render<T: Serialize + ?Sized>(format: OutputFormat, data: &T) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
    };
    rendered.map_err(CliError::Output)
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", output.trim_end());
}

/// Render and print in one step.
pub fn emit<T: Serialize + ?Sized>(format: OutputFormat, data: &T, quiet: bool) -> Result<(), CliError> {
    let out = render(format, data)?;
    print_output(&out, quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn compact_json_is_one_line() {
        let out = render(OutputFormat::JsonCompact, &json!({"data": [1, 2]})).unwrap();
        assert_eq!(out, r#"{"data":[1,2]}"#);
    }

    #[test]
    fn yaml_renders_maps() {
        let out = render(OutputFormat::Yaml, &json!({"added": 2})).unwrap();
        assert_eq!(out.trim(), "added: 2");
    }
}
