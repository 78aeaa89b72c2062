//! Subcommand arguments and handlers

pub mod records;
pub mod workbook;

use anyhow::{Result, bail};

use crate::workbook::CellValue;

/// Parse `column=value` from the command line
pub fn parse_assignment(s: &str) -> Result<(String, CellValue)> {
    let Some((column, value)) = s.split_once('=') else {
        bail!("Expected column=value, got '{}'", s);
    };

    let column = column.trim();
    if column.is_empty() {
        bail!("Missing column name in '{}'", s);
    }

    Ok((column.to_string(), CellValue::parse(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("id=3").unwrap(),
            ("id".to_string(), CellValue::from(3))
        );
        assert_eq!(
            parse_assignment("note=a=b").unwrap(),
            ("note".to_string(), CellValue::from("a=b"))
        );
        assert_eq!(
            parse_assignment("email=").unwrap(),
            ("email".to_string(), CellValue::Null)
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=3").is_err());
    }
}
