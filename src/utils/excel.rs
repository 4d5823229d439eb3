//! Excel 导入
//!
//! 支持 xlsx、xls、ods。按工作表顺序逐行回调，第一列为空的行视为空行跳过，
//! 行号为表格中的绝对行号（从 0 开始）。

use axum::extract::Multipart;
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::warn;

use crate::core::error::{CoreError, CoreResult};
use crate::utils::file::UPLOAD_FIELD;

/// 单元格转文本，整数值的浮点数不带小数部分
pub fn cell_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// 读取指定列，越界时返回空字符串
pub fn read_cell(cells: &[String], index: usize) -> &str {
    cells.get(index).map(String::as_str).unwrap_or_default()
}

/// 工作表区域按绝对行列展开为文本行
fn range_rows(range: &Range<Data>) -> Vec<(usize, Vec<String>)> {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or_default();
    range
        .rows()
        .enumerate()
        .map(|(i, row)| {
            let mut cells = vec![String::new(); col_offset];
            cells.extend(row.iter().map(cell_string));
            (row_offset + i, cells)
        })
        .collect()
}

/// 读取前 `sheet_count` 个工作表，`f(sheet_index, row_index, cells)`
///
/// 不存在的工作表跳过，`start_row` 之前的行不回调。
pub fn read_sheets<RS, F>(reader: RS, start_row: usize, sheet_count: usize, mut f: F) -> CoreResult<()>
where
    RS: Read + Seek + Clone,
    F: FnMut(usize, usize, &[String]) -> CoreResult<()>,
{
    let mut workbook = open_workbook_auto_from_rs(reader)?;
    for sheet in 0..sheet_count {
        let Some(range) = workbook.worksheet_range_at(sheet) else {
            warn!("[Excel]工作表不存在: {}", sheet);
            continue;
        };
        for (row_index, cells) in range_rows(&range?) {
            if row_index < start_row || read_cell(&cells, 0).is_empty() {
                continue;
            }
            f(sheet, row_index, &cells)?;
        }
    }
    Ok(())
}

/// 读取第一个工作表
pub fn read_rows<RS, F>(reader: RS, start_row: usize, mut f: F) -> CoreResult<()>
where
    RS: Read + Seek + Clone,
    F: FnMut(usize, &[String]) -> CoreResult<()>,
{
    read_sheets(reader, start_row, 1, |_, row_index, cells| f(row_index, cells))
}

/// 读取本地 Excel 文件，读取完成后删除该文件
pub async fn read_data<F>(path: impl AsRef<Path>, start_row: usize, sheet_count: usize, f: F) -> CoreResult<()>
where
    F: FnMut(usize, usize, &[String]) -> CoreResult<()>,
{
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    read_sheets(Cursor::new(data), start_row, sheet_count, f)?;
    tokio::fs::remove_file(path).await?;
    Ok(())
}

/// 读取表单上传的 Excel 文件，字段名为 `file`
pub async fn read_multipart<F>(
    multipart: &mut Multipart,
    start_row: usize,
    sheet_count: usize,
    f: F,
) -> CoreResult<()>
where
    F: FnMut(usize, usize, &[String]) -> CoreResult<()>,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::BadRequest(format!("读取上传文件失败: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| CoreError::BadRequest(format!("读取上传文件失败: {}", e)))?;
        return read_sheets(Cursor::new(data.to_vec()), start_row, sheet_count, f);
    }
    Err(CoreError::BadRequest("未找到上传文件".to_string()))
}
