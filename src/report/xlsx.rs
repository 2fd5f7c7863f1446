//! Excel workbook output.

use super::assembler::{Cell, Sheet};
use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};

const HEADER_BACKGROUND: u32 = 0x1E3A8A;
const MAX_SHEET_NAME: usize = 31;

/// Render sheets into an in-memory xlsx workbook.
pub fn to_xlsx(sheets: &[Sheet]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();

    let header = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(HEADER_BACKGROUND))
        .set_align(FormatAlign::Center);
    let percent = Format::new().set_num_format("0.0%");

    let mut used_names: Vec<String> = Vec::new();

    for sheet in sheets {
        let name = unique_name(&sheet_name(&sheet.title), &used_names);
        used_names.push(name.clone());

        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&name)
            .with_context(|| format!("Invalid sheet name: {}", name))?;

        for (col, title) in sheet.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, title, &header)?;
        }

        for (r, row) in sheet.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                let c = c as u16;
                match cell {
                    Cell::Text(s) => {
                        worksheet.write_string(r, c, s)?;
                    }
                    Cell::Number(n) => {
                        worksheet.write_number(r, c, *n)?;
                    }
                    Cell::Percent(p) => {
                        worksheet.write_number_with_format(r, c, *p, &percent)?;
                    }
                    Cell::Empty => {}
                }
            }
        }

        worksheet.set_freeze_panes(1, 0)?;
        worksheet.autofit();
    }

    let buffer = workbook
        .save_to_buffer()
        .context("Failed to build xlsx workbook")?;

    Ok(buffer)
}

/// Make a title usable as a worksheet name.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').trim();

    if cleaned.is_empty() {
        return "Sheet".to_string();
    }
    cleaned.chars().take(MAX_SHEET_NAME).collect()
}

fn unique_name(name: &str, used: &[String]) -> String {
    let taken = |candidate: &str| used.iter().any(|u| u.eq_ignore_ascii_case(candidate));
    if !taken(name) {
        return name.to_string();
    }

    let mut n = 2;
    loop {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        let candidate: String = name.chars().take(keep).collect::<String>() + &suffix;
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_name_strips_forbidden_chars() {
        assert_eq!(sheet_name("Detail: 2024/05"), "Detail_ 2024_05");
        assert_eq!(sheet_name("  "), "Sheet");
        assert_eq!(sheet_name("'quoted'"), "quoted");
    }

    #[test]
    fn test_sheet_name_is_truncated() {
        let long = "A very long sheet title that Excel will refuse";
        assert_eq!(sheet_name(long).chars().count(), MAX_SHEET_NAME);
    }

    #[test]
    fn test_unique_name() {
        let used = vec!["Summary".to_string()];
        assert_eq!(unique_name("summary", &used), "summary (2)");
        assert_eq!(unique_name("Roster", &used), "Roster");
    }

    #[test]
    fn test_to_xlsx_produces_zip() {
        let sheets = vec![Sheet {
            title: "Executive Summary".to_string(),
            columns: vec!["Module".to_string(), "Completion".to_string()],
            rows: vec![
                vec![Cell::Text("Módulo 1".to_string()), Cell::Percent(0.5)],
                vec![Cell::Text("Módulo 2".to_string()), Cell::Empty],
            ],
        }];

        let bytes = to_xlsx(&sheets).unwrap();
        // xlsx files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }
}
