// ==========================================
// 智能营销数据平台 - 表格导入 CLI 入口
// ==========================================
// 用法:
//   sheet-importer preview <org_id> <source_ref>
//   sheet-importer import  <org_id> <source_ref>
//   sheet-importer batches <org_id> [limit]
// ==========================================

use sheet_importer::app::{get_default_db_path, AppState};
use sheet_importer::logging;

fn print_usage() {
    println!("{} v{}", sheet_importer::APP_NAME, sheet_importer::VERSION);
    println!();
    println!("用法:");
    println!("  sheet-importer preview <org_id> <source_ref>   预览列识别结果（不落库）");
    println!("  sheet-importer import  <org_id> <source_ref>   提交导入");
    println!("  sheet-importer batches <org_id> [limit]        查看最近导入批次");
    println!();
    println!("环境变量:");
    println!("  SHEET_IMPORTER_DB_PATH  数据库文件路径（默认: 用户数据目录）");
    println!("  RUST_LOG                日志级别（默认: info）");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let command = match args.next() {
        Some(c) => c,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let db_path = get_default_db_path();
    tracing::info!(db_path = %db_path, "使用数据库");

    let state = AppState::new(db_path)?;

    match command.as_str() {
        "preview" => {
            let org_id = args.next().ok_or("缺少参数: org_id")?;
            let source_ref = args.next().ok_or("缺少参数: source_ref")?;

            let response = state.import_api.preview(&org_id, &source_ref).await?;

            println!("行数: {}  列数: {}", response.row_count, response.column_count);
            println!("{}", "-".repeat(50));
            for col in &response.columns {
                match col.detected_as {
                    Some(tag) => println!(
                        "  {:<30} →  {} ({:.2})",
                        col.name, tag, col.confidence
                    ),
                    None => println!("  {:<30}     (忽略)", col.name),
                }
            }
            println!("{}", "-".repeat(50));
            for warning in &response.warnings {
                println!("  告警: {}", warning);
            }
        }
        "import" => {
            let org_id = args.next().ok_or("缺少参数: org_id")?;
            let source_ref = args.next().ok_or("缺少参数: source_ref")?;

            let response = state.import_api.commit(&org_id, &source_ref).await?;

            println!("{}", response.message);
            if response.success {
                println!(
                    "  新建客户: {}  更新客户: {}",
                    response.customers_imported, response.customers_updated
                );
                println!(
                    "  新建订单: {}  重复跳过: {}  整行跳过: {}",
                    response.orders_imported,
                    response.orders_skipped_as_duplicate,
                    response.rows_skipped
                );
                println!("  耗时: {} ms", response.elapsed_ms);
            }
            for warning in &response.warnings {
                println!("  告警: {}", warning);
            }
        }
        "batches" => {
            let org_id = args.next().ok_or("缺少参数: org_id")?;
            let limit = args
                .next()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(10);

            let batches = state.import_api.recent_batches(&org_id, limit).await?;
            for batch in batches {
                println!(
                    "{}  {}  行 {}  +客户 {}  +订单 {}  跳过 {}",
                    batch.imported_at.format("%Y-%m-%d %H:%M:%S"),
                    batch.batch_id,
                    batch.row_count,
                    batch.customers_imported,
                    batch.orders_imported,
                    batch.orders_skipped + batch.rows_skipped,
                );
            }
        }
        _ => {
            print_usage();
        }
    }

    Ok(())
}
