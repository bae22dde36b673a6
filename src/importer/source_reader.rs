// ==========================================
// 智能营销数据平台 - 源读取器实现
// ==========================================
// 职责: 管道阶段 0,从外部源取回表头 + 数据行
// 支持: CSV (.csv) / Excel (.xlsx/.xls) / 内存源
// ==========================================

use crate::domain::import::SheetData;
use crate::importer::error::ImportError;
use crate::importer::sheet_importer_trait::SheetSource;
use async_trait::async_trait;
use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 行数校验: 空源与超限源都在读取阶段拦截
fn check_row_bounds(source_ref: &str, rows: &[Vec<String>], max_rows: usize) -> Result<(), ImportError> {
    if rows.is_empty() {
        return Err(ImportError::SourceEmpty(source_ref.to_string()));
    }
    if rows.len() > max_rows {
        return Err(ImportError::SourceTooLarge {
            rows: rows.len(),
            cap: max_rows,
        });
    }
    Ok(())
}

// ==========================================
// CSV 源实现
// ==========================================
pub struct CsvFileSource;

#[async_trait]
impl SheetSource for CsvFileSource {
    async fn read(&self, source_ref: &str, max_rows: usize) -> Result<SheetData, ImportError> {
        let path = Path::new(source_ref);

        if !path.exists() {
            return Err(ImportError::SourceUnreachable {
                source_ref: source_ref.to_string(),
                detail: "文件不存在".to_string(),
            });
        }

        let file = File::open(path).map_err(|e| ImportError::SourceUnreachable {
            source_ref: source_ref.to_string(),
            detail: e.to_string(),
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头
        let header: Vec<String> = reader
            .headers()
            .map_err(|e| ImportError::CsvParseError(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        // 读取所有行
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| ImportError::CsvParseError(e.to_string()))?;
            let row: Vec<String> = record.iter().map(|v| v.trim().to_string()).collect();

            // 跳过完全空白的行
            if row.iter().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(row);
        }

        check_row_bounds(source_ref, &rows, max_rows)?;
        Ok(SheetData { header, rows })
    }
}

// ==========================================
// Excel 源实现
// ==========================================
pub struct ExcelFileSource;

#[async_trait]
impl SheetSource for ExcelFileSource {
    async fn read(&self, source_ref: &str, max_rows: usize) -> Result<SheetData, ImportError> {
        let path = Path::new(source_ref);

        if !path.exists() {
            return Err(ImportError::SourceUnreachable {
                source_ref: source_ref.to_string(),
                detail: "文件不存在".to_string(),
            });
        }

        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| ImportError::ExcelParseError(e.to_string()))?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(ImportError::ExcelParseError("Excel 文件无工作表".to_string()));
        }

        let sheet_name = sheet_names[0].clone();
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;

        // 第一行为表头
        let mut range_rows = range.rows();
        let header_row = range_rows
            .next()
            .ok_or_else(|| ImportError::SourceEmpty(source_ref.to_string()))?;

        let header: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for data_row in range_rows {
            let row: Vec<String> = data_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect();

            if row.iter().all(|v| v.is_empty()) {
                continue;
            }

            rows.push(row);
        }

        check_row_bounds(source_ref, &rows, max_rows)?;
        Ok(SheetData { header, rows })
    }
}

// ==========================================
// 内存源实现
// ==========================================
// 用途: 嵌入调用与集成测试（无文件 IO）
pub struct MemorySource {
    data: SheetData,
}

impl MemorySource {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            data: SheetData { header, rows },
        }
    }
}

#[async_trait]
impl SheetSource for MemorySource {
    async fn read(&self, source_ref: &str, max_rows: usize) -> Result<SheetData, ImportError> {
        check_row_bounds(source_ref, &self.data.rows, max_rows)?;
        Ok(self.data.clone())
    }
}

// ==========================================
// 通用源解析（按扩展名选择实现）
// ==========================================
pub struct UniversalSource;

#[async_trait]
impl SheetSource for UniversalSource {
    async fn read(&self, source_ref: &str, max_rows: usize) -> Result<SheetData, ImportError> {
        let ext = Path::new(source_ref)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvFileSource.read(source_ref, max_rows).await,
            "xlsx" | "xls" => ExcelFileSource.read(source_ref, max_rows).await,
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        f
    }

    #[tokio::test]
    async fn test_csv_source_basic() {
        let f = write_csv(&[
            "Email,Amount",
            "a@x.com,10.00",
            "b@x.com,20.00",
        ]);

        let sheet = CsvFileSource
            .read(f.path().to_str().unwrap(), 1000)
            .await
            .unwrap();

        assert_eq!(sheet.header, vec!["Email", "Amount"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], "a@x.com");
    }

    #[tokio::test]
    async fn test_csv_source_skips_blank_rows() {
        let f = write_csv(&["Email,Amount", "a@x.com,10.00", ",", "b@x.com,20.00"]);

        let sheet = CsvFileSource
            .read(f.path().to_str().unwrap(), 1000)
            .await
            .unwrap();

        assert_eq!(sheet.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_csv_source_missing_file() {
        let result = CsvFileSource.read("no_such_file.csv", 1000).await;
        assert!(matches!(
            result,
            Err(ImportError::SourceUnreachable { .. })
        ));
    }

    #[tokio::test]
    async fn test_csv_source_empty_is_error() {
        let f = write_csv(&["Email,Amount"]);
        let result = CsvFileSource.read(f.path().to_str().unwrap(), 1000).await;
        assert!(matches!(result, Err(ImportError::SourceEmpty(_))));
    }

    #[tokio::test]
    async fn test_row_cap_enforced() {
        let f = write_csv(&["Email", "a@x.com", "b@x.com", "c@x.com"]);
        let result = CsvFileSource.read(f.path().to_str().unwrap(), 2).await;
        assert!(matches!(
            result,
            Err(ImportError::SourceTooLarge { rows: 3, cap: 2 })
        ));
    }

    #[tokio::test]
    async fn test_universal_source_rejects_unknown_extension() {
        let result = UniversalSource.read("data.parquet", 1000).await;
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_sample_columns_window() {
        let sheet = SheetData {
            header: vec!["A".into(), "B".into()],
            rows: (0..10)
                .map(|i| vec![format!("a{}", i), format!("b{}", i)])
                .collect(),
        };

        let cols = sheet.sample_columns(3);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].sample_values, vec!["a0", "a1", "a2"]);
        assert_eq!(cols[1].header, "B");
    }
}
