use std::fs;
use std::io;

use camino::Utf8Path;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DragontailError;
use crate::store::Store;

pub type ChampionTable = Map<String, Value>;

pub fn project_champions(document: &Value) -> Result<ChampionTable, String> {
    let root = document
        .as_object()
        .ok_or_else(|| "top-level value is not an object".to_string())?;
    let data = match root.get("data") {
        Some(Value::Object(data)) => data,
        Some(_) => return Err("`data` is not an object".to_string()),
        None => return Err("missing `data` object".to_string()),
    };

    data.iter()
        .map(|(id, record)| {
            let record = record
                .as_object()
                .ok_or_else(|| format!("record `{id}` is not an object"))?;
            let name = record.get("name").cloned().unwrap_or(Value::Null);
            Ok((id.clone(), name))
        })
        .collect()
}

pub fn read_champion_document(path: &Utf8Path) -> Result<Value, DragontailError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => DragontailError::MissingInput(path.to_path_buf()),
        _ => DragontailError::Filesystem(format!("read {path}: {err}")),
    })?;
    serde_json::from_str(&content).map_err(|err| DragontailError::MalformedInput {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

pub fn render_table(table: &ChampionTable) -> Result<Vec<u8>, DragontailError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    table
        .serialize(&mut serializer)
        .map_err(|err| DragontailError::Filesystem(err.to_string()))?;
    Ok(out)
}

pub fn generate(source: &Utf8Path, output: &Utf8Path) -> Result<ChampionTable, DragontailError> {
    let document = read_champion_document(source)?;
    let table = project_champions(&document).map_err(|message| DragontailError::MalformedInput {
        path: source.to_path_buf(),
        message,
    })?;
    Store::write_bytes_atomic(output, &render_table(&table)?)?;
    Ok(table)
}
