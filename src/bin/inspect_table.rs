use anyhow::{Context, Result};
use rinkload::duck::{render_value, Store};
use std::{env, process::exit};

fn main() {
    // usage: inspect_table <DB_PATH> <TABLE> [LIMIT]
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("Usage: {} <DB_PATH> <TABLE> [LIMIT]", args[0]);
        exit(1);
    }
    let limit = match args.get(3).map(|s| s.parse::<usize>()) {
        None => 5,
        Some(Ok(n)) => n,
        Some(Err(e)) => {
            eprintln!("Invalid LIMIT: {}", e);
            exit(1);
        }
    };
    if let Err(e) = inspect_table(&args[1], &args[2], limit) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Print the persisted schema of `table`, then its first `limit` rows.
fn inspect_table(db_path: &str, table: &str, limit: usize) -> Result<()> {
    let store = Store::open(db_path)?;
    let columns = store
        .table_info(table)
        .with_context(|| format!("inspecting {} in {}", table, db_path))?;

    println!("=== Schema of table '{}' ===", table);
    for col in &columns {
        println!("- {:<30} | {}", col.name, col.data_type);
    }
    println!();

    let (names, rows) = store.preview(table, limit)?;
    println!("=== Preview ({} rows) ===", rows.len());
    println!("{}", names.join(" | "));
    for row in rows {
        let cells: Vec<String> = row.iter().map(render_value).collect();
        println!("{}", cells.join(" | "));
    }

    store.close()
}
