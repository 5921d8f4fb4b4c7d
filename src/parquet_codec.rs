use std::sync::Arc;

use bytes::Bytes;
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::Field;
use parquet::schema::types::{Type, TypePtr};

use crate::error::Result;
use crate::table::{Cell, ColumnKind, Table};

fn infer_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> Option<ColumnKind> {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        let next = match cell {
            Cell::Null => continue,
            Cell::Bool(_) => ColumnKind::Bool,
            Cell::Int(_) => ColumnKind::Int,
            Cell::Float(_) => ColumnKind::Double,
            Cell::Text(_) => return Some(ColumnKind::Text),
        };
        kind = Some(match (kind, next) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Double)
            | (Some(ColumnKind::Double), ColumnKind::Int) => ColumnKind::Double,
            _ => ColumnKind::Text,
        });
    }
    kind
}

/// A declared kind wins for all-null columns and widens integer cells to
/// double. Cells it cannot hold keep the inferred kind.
fn resolve_kind(declared: Option<ColumnKind>, inferred: Option<ColumnKind>) -> ColumnKind {
    match (declared, inferred) {
        (Some(declared), None) => declared,
        (Some(ColumnKind::Double), Some(ColumnKind::Int)) => ColumnKind::Double,
        (_, Some(inferred)) => inferred,
        (None, None) => ColumnKind::Text,
    }
}

fn column_type(name: &str, kind: ColumnKind) -> Result<TypePtr> {
    let physical = match kind {
        ColumnKind::Bool => PhysicalType::BOOLEAN,
        ColumnKind::Int => PhysicalType::INT64,
        ColumnKind::Double => PhysicalType::DOUBLE,
        ColumnKind::Text => PhysicalType::BYTE_ARRAY,
    };
    let mut builder =
        Type::primitive_type_builder(name, physical).with_repetition(Repetition::OPTIONAL);
    if kind == ColumnKind::Text {
        builder = builder.with_converted_type(ConvertedType::UTF8);
    }
    Ok(Arc::new(builder.build()?))
}

pub fn encode_table(table: &Table) -> Result<Vec<u8>> {
    encode_table_with(table, &[])
}

pub fn encode_table_with(table: &Table, declared: &[(String, ColumnKind)]) -> Result<Vec<u8>> {
    let kinds = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let hint = declared
                .iter()
                .find(|(col, _)| col == name)
                .map(|(_, kind)| *kind);
            resolve_kind(hint, infer_kind(table.column_cells(idx)))
        })
        .collect::<Vec<_>>();

    let fields = table
        .columns()
        .iter()
        .zip(&kinds)
        .map(|(name, kind)| column_type(name, *kind))
        .collect::<Result<Vec<_>>>()?;
    let schema = Arc::new(
        Type::group_type_builder("schema")
            .with_fields(fields)
            .build()?,
    );
    let props = Arc::new(WriterProperties::builder().build());

    let mut buf = Vec::new();
    let mut writer = SerializedFileWriter::new(&mut buf, schema, props)?;
    let mut row_group = writer.next_row_group()?;
    let mut col_idx = 0usize;
    while let Some(mut column) = row_group.next_column()? {
        let cells = table.column_cells(col_idx).collect::<Vec<_>>();
        let defs = cells
            .iter()
            .map(|c| if c.is_null() { 0i16 } else { 1i16 })
            .collect::<Vec<_>>();
        match kinds[col_idx] {
            ColumnKind::Bool => {
                let values = cells
                    .iter()
                    .filter_map(|c| match c {
                        Cell::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                column
                    .typed::<BoolType>()
                    .write_batch(&values, Some(&defs), None)?;
            }
            ColumnKind::Int => {
                let values = cells
                    .iter()
                    .filter_map(|c| match c {
                        Cell::Int(v) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                column
                    .typed::<Int64Type>()
                    .write_batch(&values, Some(&defs), None)?;
            }
            ColumnKind::Double => {
                let values = cells
                    .iter()
                    .filter_map(|c| match c {
                        Cell::Int(v) => Some(*v as f64),
                        Cell::Float(v) => Some(*v),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                column
                    .typed::<DoubleType>()
                    .write_batch(&values, Some(&defs), None)?;
            }
            ColumnKind::Text => {
                let values = cells
                    .iter()
                    .filter(|c| !c.is_null())
                    .map(|c| ByteArray::from(c.render().as_str()))
                    .collect::<Vec<_>>();
                column
                    .typed::<ByteArrayType>()
                    .write_batch(&values, Some(&defs), None)?;
            }
        }
        column.close()?;
        col_idx += 1;
    }
    row_group.close()?;
    writer.close()?;
    Ok(buf)
}

pub fn decode_table(bytes: Vec<u8>) -> Result<Table> {
    let reader = SerializedFileReader::new(Bytes::from(bytes))?;
    let columns = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect::<Vec<_>>();
    let mut table = Table::new(columns)?;

    for row in reader.get_row_iter(None)? {
        let row = row?;
        let cells = row
            .get_column_iter()
            .map(|(_, field)| field_to_cell(field))
            .collect::<Vec<_>>();
        table.push_row(cells)?;
    }
    Ok(table)
}

fn field_to_cell(field: &Field) -> Cell {
    match field {
        Field::Null => Cell::Null,
        Field::Bool(b) => Cell::Bool(*b),
        Field::Byte(v) => Cell::Int(i64::from(*v)),
        Field::Short(v) => Cell::Int(i64::from(*v)),
        Field::Int(v) => Cell::Int(i64::from(*v)),
        Field::Long(v) => Cell::Int(*v),
        Field::UByte(v) => Cell::Int(i64::from(*v)),
        Field::UShort(v) => Cell::Int(i64::from(*v)),
        Field::UInt(v) => Cell::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Cell::Int)
            .unwrap_or(Cell::Float(*v as f64)),
        Field::Float(v) => Cell::Float(f64::from(*v)),
        Field::Double(v) => Cell::Float(*v),
        Field::Str(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}
