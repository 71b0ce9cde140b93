use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use thiserror::Error;

use crate::core::errors::{ApiError, DatabaseError};
use crate::core::messages;
use crate::db::{self, Database, NewKnowledgeRow};

pub const SPREADSHEET_EXTENSION: &str = ".xlsx";

const COLUMNS: [&str; 5] = ["Keywords", "Title", "Source", "Content", "Category"];

#[derive(Debug, Error)]
#[error("{}", messages::fill(messages::ERROR_MESSAGE_SPREADSHEET_PARSER_FAIL, .0))]
pub struct SpreadsheetError(pub String);

/// Stores every row of an uploaded knowledge spreadsheet as not yet
/// embedded. All rows are written in one transaction.
pub async fn upload_file(db: &Database, filename: &str, bytes: Vec<u8>) -> Result<usize, ApiError> {
    tracing::info!("Action: upload_file");

    if !filename.ends_with(SPREADSHEET_EXTENSION) {
        tracing::info!("{}", messages::ERROR_MESSAGE_NOT_EXCEL_FILE);
        return Err(ApiError::BadRequest(messages::ERROR_MESSAGE_NOT_EXCEL_FILE.to_string()));
    }

    let rows = tokio::task::spawn_blocking(move || parse_workbook(&bytes))
        .await
        .map_err(ApiError::general)?
        .map_err(|err| {
            tracing::info!("{}", err);
            ApiError::BadRequest(err.to_string())
        })?;

    let stored: Result<u64, DatabaseError> = async {
        let mut tx = db.begin().await?;
        let inserted = db::insert_knowledge_rows(&mut tx, &rows).await?;
        tx.commit().await?;
        Ok::<u64, DatabaseError>(inserted)
    }
    .await;

    match stored {
        Ok(inserted) => {
            tracing::info!("{} ({} rows)", messages::SUCCESS_MESSAGE_FILE_UPLOAD, inserted);
            Ok(rows.len())
        }
        Err(err) => {
            tracing::error!("{}", err);
            Err(ApiError::general(err))
        }
    }
}

/// Reads the first worksheet. Columns are located by their header names;
/// rows with every cell blank are skipped.
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<NewKnowledgeRow>, SpreadsheetError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: calamine::XlsxError| SpreadsheetError(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SpreadsheetError("workbook has no worksheets".to_string()))?
        .map_err(|e| SpreadsheetError(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| SpreadsheetError("worksheet is empty".to_string()))?
        .iter()
        .map(|cell| cell_text(cell).trim().to_string())
        .collect();

    let mut positions = [0usize; COLUMNS.len()];
    for (slot, column) in positions.iter_mut().zip(COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| SpreadsheetError(format!("missing column '{}'", column)))?;
    }

    let mut parsed = Vec::new();
    for row in rows {
        let [keywords, title, source, content, category] =
            positions.map(|i| row.get(i).map(cell_text).unwrap_or_default());

        let record = NewKnowledgeRow {
            keywords,
            title,
            source,
            content,
            category,
        };
        if record == NewKnowledgeRow::default() {
            continue;
        }
        parsed.push(record);
    }
    Ok(parsed)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("{:?}", e),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::temp_database;
    use rust_xlsxwriter::Workbook;

    fn workbook(header: &[&str], rows: &[[&str; 5]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in header.iter().enumerate() {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32 + 1, col as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn columns_are_located_by_header() {
        let bytes = workbook(
            &["Title", "Content", "Category", "Keywords", "Source"],
            &[["Refunds", "Within 14 days.", "billing", "refund", "https://example.test"]],
        );
        let rows = parse_workbook(&bytes).unwrap();
        assert_eq!(
            rows,
            vec![NewKnowledgeRow {
                keywords: "refund".to_string(),
                title: "Refunds".to_string(),
                source: "https://example.test".to_string(),
                content: "Within 14 days.".to_string(),
                category: "billing".to_string(),
            }]
        );
    }

    #[test]
    fn missing_column_is_a_parser_error() {
        let bytes = workbook(&["Title", "Content"], &[]);
        let err = parse_workbook(&bytes).unwrap_err();
        assert!(err.to_string().starts_with("Spreadsheet parser error."));
        assert!(parse_workbook(b"not a zip archive").is_err());
    }

    #[tokio::test]
    async fn non_spreadsheet_upload_writes_nothing() {
        let db = temp_database().await;
        let err = upload_file(&db, "faq.csv", b"a,b".to_vec()).await.unwrap_err();
        assert_eq!(err.message(), messages::ERROR_MESSAGE_NOT_EXCEL_FILE);

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(db::pending_knowledge_rows(&mut conn).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn uploaded_rows_are_pending() {
        let db = temp_database().await;
        let bytes = workbook(
            &COLUMNS,
            &[
                ["refund", "Refunds", "https://a.test", "Within 14 days.", "billing"],
                ["", "", "", "", ""],
                ["login", "Login", "https://b.test", "Use your email.", "account"],
            ],
        );

        assert_eq!(upload_file(&db, "faq.xlsx", bytes).await.unwrap(), 2);

        let mut conn = db.pool().acquire().await.unwrap();
        let pending = db::pending_knowledge_rows(&mut conn).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].title, "Login");
    }
}
