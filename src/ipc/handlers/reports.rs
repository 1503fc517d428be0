use super::{opt_str_param, str_param};
use crate::error::{AppError, AppResult};
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use crate::report::{self, Format, PdfLayout};
use serde_json::Value;
use std::path::PathBuf;

fn preview(state: &AppState, params: &Value) -> AppResult<Value> {
    let p = report::preview(
        state.conn()?,
        str_param(params, "studentId")?,
        str_param(params, "periodId")?,
    )?;
    Ok(serde_json::to_value(p)?)
}

fn layout_param(params: &Value) -> AppResult<PdfLayout> {
    match params.get("layout") {
        None | Some(Value::Null) => Ok(PdfLayout::default()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|_| AppError::BadParams(format!("unknown layout: {v}"))),
    }
}

fn export(state: &AppState, params: &Value, format: Format) -> AppResult<Value> {
    let student_id = str_param(params, "studentId")?;
    let period_id = str_param(params, "periodId")?;
    let layout = layout_param(params)?;
    let out_dir = match opt_str_param(params, "outDir") {
        Some(d) => PathBuf::from(d),
        None => state.export_dir()?,
    };
    let file = report::export(state.conn()?, student_id, period_id, format, layout, &out_dir)?;
    Ok(serde_json::to_value(file)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "reports.preview" => preview(state, &req.params),
        "reports.exportPdf" => export(state, &req.params, Format::Pdf),
        "reports.exportXlsx" => export(state, &req.params, Format::Xlsx),
        _ => return None,
    };
    Some(reply(req, outcome))
}
