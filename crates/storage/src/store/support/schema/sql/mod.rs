#![forbid(unsafe_code)]

mod core;
mod execution;
mod flows;
mod indexes;
mod items;

pub(super) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(core::SQL);
    sql.push_str(items::SQL);
    sql.push_str(flows::SQL);
    sql.push_str(execution::SQL);
    sql.push_str(indexes::SQL);
    sql
}
