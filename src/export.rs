//! 导出为分隔文本（CSV/TSV/竖线）

use std::io::{self, Write};
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::core::{format_output_path, Record};
use crate::error::HarvestError;
use crate::extract::{ExportColumn, Profile};

/// 字段分隔符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Pipe,
}

impl Delimiter {
    pub fn as_char(&self) -> char {
        match self {
            Delimiter::Comma => ',',
            Delimiter::Tab => '\t',
            Delimiter::Pipe => '|',
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Delimiter::Comma => "csv",
            Delimiter::Tab => "tsv",
            Delimiter::Pipe => "txt",
        }
    }
}

impl FromStr for Delimiter {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" | "comma" | "," => Ok(Delimiter::Comma),
            "tsv" | "tab" => Ok(Delimiter::Tab),
            "pipe" | "|" => Ok(Delimiter::Pipe),
            other => Err(HarvestError::Config(format!(
                "未知的分隔符 '{}'，可用: csv, tsv, pipe",
                other
            ))),
        }
    }
}

/// 导出列：表头文字和记录中的列名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumns {
    columns: Vec<ExportColumn>,
}

impl ExportColumns {
    pub fn new(columns: Vec<ExportColumn>) -> Self {
        ExportColumns { columns }
    }

    pub fn from_profile(profile: &Profile) -> Self {
        Self::new(profile.export_columns())
    }

    /// 解析 `key[:label],...`，省略表头时使用列名
    pub fn parse(list: &str) -> Result<Self, HarvestError> {
        let columns: Vec<ExportColumn> = list
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once(':') {
                Some((key, label)) => ExportColumn::new(key.trim(), label.trim()),
                None => ExportColumn::new(part, part),
            })
            .collect();

        if columns.is_empty() {
            return Err(HarvestError::Config("导出列不能为空".to_string()));
        }
        Ok(Self::new(columns))
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    pub fn row(&self, record: &Record) -> Vec<String> {
        self.columns.iter().map(|c| record.column(&c.key)).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// 写入一行
pub fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", sep)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// 按存储顺序（最新在前）写出全部记录
pub fn write_records<'a, W, I>(
    mut w: W,
    records: I,
    columns: &ExportColumns,
    delimiter: Delimiter,
    include_headers: bool,
) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Record>,
{
    let sep = delimiter.as_char();
    if include_headers {
        write_row(&mut w, &columns.headers(), sep)?;
    }

    let mut written = 0;
    for record in records {
        write_row(&mut w, &columns.row(record), sep)?;
        written += 1;
    }
    w.flush()?;
    Ok(written)
}

/// 生成完整导出文本
pub fn to_export_string<'a, I>(
    records: I,
    columns: &ExportColumns,
    delimiter: Delimiter,
    include_headers: bool,
) -> String
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buf = Vec::new();
    // 写入 Vec 不会失败
    let _ = write_records(&mut buf, records, columns, delimiter, include_headers);
    String::from_utf8_lossy(&buf).into_owned()
}

/// 把导出文本编码为 data URL
pub fn to_data_url(text: &str) -> String {
    format!(
        "data:text/csv;charset=utf-8,{}",
        utf8_percent_encode(text, NON_ALPHANUMERIC)
    )
}

/// 默认导出文件名
pub fn default_export_name(profile_name: &str, profile: &Profile, delimiter: Delimiter) -> String {
    let template = profile
        .export_name
        .as_deref()
        .unwrap_or("%profile%_%date%.%ext%");
    let name = format_output_path(template, Some(profile_name), delimiter.extension());
    match delimiter {
        Delimiter::Comma => name,
        _ => match name.rsplit_once('.') {
            Some((stem, "csv")) => format!("{}.{}", stem, delimiter.extension()),
            _ => name,
        },
    }
}
