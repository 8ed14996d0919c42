// src/pipeline/staging.rs
use std::path::Path;
use tracing::info;

use crate::db::{DbError, Session};
use crate::process::normalize::{FIELD_DELIMITER, LINE_TERMINATOR};

/// Staging columns in staging-file order. The file is mapped onto these
/// positionally; header names in the file are ignored.
pub const STAGING_COLUMNS: [&str; 16] = [
    "nombre_campana",
    "ad_group",
    "oferta",
    "id_producto",
    "impresiones",
    "clics",
    "interes",
    "cpc",
    "ctr",
    "costo",
    "retorno_inversion",
    "pedidos",
    "ventas",
    "fecha",
    "fecha_add",
    "fecha_update",
];

pub const CURRENCY_COLUMN: &str = "divisa";
pub const KEY_COLUMN: &str = "indice";
/// campaign name, ad group, bid, date; concatenated without separator.
pub const KEY_PARTS: [&str; 4] = ["nombre_campana", "ad_group", "oferta", "fecha"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTable {
    schema: Option<String>,
    table: String,
    currency: String,
}

impl StagingTable {
    pub fn new(schema: Option<&str>, table: &str, currency: &str) -> Self {
        Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
            currency: currency.to_string(),
        }
    }

    /// `` `schema`.`table` `` or `` `table` ``
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    /// The two whole-table updates that fill the derived columns.
    pub fn derive_statements(&self) -> [String; 2] {
        let table = self.qualified_name();
        let parts: Vec<String> = KEY_PARTS.iter().map(|c| quote_ident(c)).collect();
        [
            format!(
                "UPDATE {table} SET {} = {};",
                quote_ident(CURRENCY_COLUMN),
                quote_str(&self.currency)
            ),
            format!(
                "UPDATE {table} SET {} = CONCAT({});",
                quote_ident(KEY_COLUMN),
                parts.join(", ")
            ),
        ]
    }
}

/// `LOAD DATA LOCAL INFILE` for one staging file.
pub struct LoadStatement<'a> {
    table: &'a StagingTable,
    file: &'a Path,
}

impl<'a> LoadStatement<'a> {
    pub fn new(table: &'a StagingTable, file: &'a Path) -> Self {
        Self { table, file }
    }

    pub fn to_sql(&self) -> String {
        // forward slashes on every platform; the server only echoes the name back
        let file = self.file.to_string_lossy().replace('\\', "/");
        let columns: Vec<String> = STAGING_COLUMNS.iter().map(|c| quote_ident(c)).collect();
        format!(
            "LOAD DATA LOW_PRIORITY LOCAL INFILE {file} \
             REPLACE INTO TABLE {table} \
             CHARACTER SET utf8 \
             FIELDS TERMINATED BY {fields} \
             LINES TERMINATED BY {lines} \
             IGNORE 1 LINES \
             ({columns});",
            file = quote_str(&file),
            table = self.table.qualified_name(),
            fields = quote_byte(FIELD_DELIMITER),
            lines = quote_byte(LINE_TERMINATOR),
            columns = columns.join(", "),
        )
    }
}

/// Replace the staging table's contents with `file` and fill the derived
/// columns, committed as one unit. Nothing is committed if any statement fails.
pub fn load_staging<S: Session + ?Sized>(
    session: &mut S,
    table: &StagingTable,
    file: &Path,
) -> Result<(), DbError> {
    let load = LoadStatement::new(table, file).to_sql();
    session.load_local_file(&load, file)?;
    info!(table = %table.qualified_name(), file = %file.display(), "staging file loaded");

    for sql in table.derive_statements() {
        session.execute(&sql)?;
    }
    session.commit()?;
    info!("derived columns set");
    Ok(())
}

fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn quote_str(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

fn quote_byte(b: u8) -> String {
    match b {
        b'\n' => "'\\n'".to_string(),
        b'\t' => "'\\t'".to_string(),
        b'\r' => "'\\r'".to_string(),
        other => quote_str(&char::from(other).to_string()),
    }
}
