use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::report::GoldView;
use crate::table::{Cell, Table};

#[derive(Debug, Clone)]
pub struct SheetSummary {
    pub name: &'static str,
    /// Data rows, header excluded. `None` when the table was missing.
    pub rows: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub season: Option<String>,
    pub sheets: Vec<SheetSummary>,
}

pub fn export_gold_workbook(path: &Path, view: &GoldView) -> Result<ExportReport> {
    let tables: [(&'static str, Option<&Table>); 4] = [
        ("KPIs", view.kpis.as_ref()),
        ("TeamTotals", view.team_totals.as_ref()),
        ("Standings", view.standings.as_ref()),
        ("LeagueHistory", view.history.as_ref()),
    ];

    let mut workbook = Workbook::new();
    let mut sheets = Vec::with_capacity(tables.len());
    for (name, table) in tables {
        let sheet = workbook.add_worksheet();
        sheet.set_name(name)?;
        match table {
            Some(table) => {
                write_table(sheet, table).with_context(|| format!("write sheet {name}"))?;
            }
            None => {
                sheet
                    .write_string(0, 0, "no data")
                    .with_context(|| format!("write sheet {name}"))?;
            }
        }
        sheets.push(SheetSummary {
            name,
            rows: table.map(Table::len),
        });
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        season: view.season.map(|s| s.to_string()),
        sheets,
    })
}

fn write_table(worksheet: &mut Worksheet, table: &Table) -> Result<()> {
    for (col_idx, name) in table.columns().iter().enumerate() {
        worksheet
            .write_string(0, col_idx as u16, name)
            .with_context(|| format!("write header ({col_idx})"))?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let xl_row = row_idx as u32 + 1;
        for (col_idx, cell) in row.iter().enumerate() {
            let xl_col = col_idx as u16;
            let written = match cell {
                Cell::Null => continue,
                Cell::Bool(v) => worksheet.write_boolean(xl_row, xl_col, *v),
                Cell::Int(v) => worksheet.write_number(xl_row, xl_col, *v as f64),
                Cell::Float(v) if v.is_finite() => worksheet.write_number(xl_row, xl_col, *v),
                Cell::Float(_) => continue,
                Cell::Text(s) => worksheet.write_string(xl_row, xl_col, s),
            };
            written.with_context(|| format!("write cell ({xl_row},{col_idx})"))?;
        }
    }
    Ok(())
}
