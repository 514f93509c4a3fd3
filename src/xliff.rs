//! XLIFF 解码器
//!
//! 将 XLIFF 1.0/1.2 文件解析为 (key, source, target) 三元组序列。
//! 纯函数、无状态，是整个导入流水线的地基。
//!
//! ## 安全约束
//! 解析绝不解析外部实体、绝不访问网络：quick-xml 不做 DTD 处理，
//! DOCTYPE 事件被直接忽略，未知实体引用导致解码失败而非展开。
//! 这是正确性/安全性硬性要求，不是优化项。
//!
//! ## 解析模型
//! 事件流解析（非 DOM），但文件通过 BufReader 一次读入内存缓冲，
//! 超大文件受可用内存约束，属已知扩展上限。

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::{TextDbError, TextDbResult};

/// 文件大小上限（100 MiB）
const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// 单文件条目数上限
const MAX_TRANS_UNITS: usize = 1_000_000;

/// 一条可翻译字符串条目
///
/// `id` 为复合键（`component|type|placeholder`），`source` 必有，
/// `target` 缺失或为空时回退到 `source`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransUnit {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl TransUnit {
    /// 导入使用的值：target，为空时回退 source
    pub fn value(&self) -> &str {
        if self.target.is_empty() {
            &self.source
        } else {
            &self.target
        }
    }
}

/// 从文件名推导语言键
///
/// 约定 `<languagecode>.<anything>.xlf`：少于三个点分段 ⇒ "default"，
/// 否则取第一段作为语言键。
pub fn language_key_from_file(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() < 3 {
        return "default".to_string();
    }

    parts[0].to_string()
}

/// 解析 XLIFF 文件
///
/// 格式错误的 XML 产生整体解码失败，不返回部分结果。
pub fn decode_file(path: &Path) -> TextDbResult<Vec<TransUnit>> {
    let display = path.display().to_string();

    let metadata = std::fs::metadata(path).map_err(|e| TextDbError::Decode {
        file: display.clone(),
        reason: format!("cannot read file metadata: {}", e),
    })?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(TextDbError::Decode {
            file: display,
            reason: format!(
                "file too large: {} bytes (max: {} bytes)",
                metadata.len(),
                MAX_FILE_SIZE
            ),
        });
    }

    let file = File::open(path).map_err(|e| TextDbError::Decode {
        file: display.clone(),
        reason: e.to_string(),
    })?;

    // 1 MiB 缓冲减少系统调用；解析本身从不是瓶颈（数据库慢 100 倍以上）
    let reader = BufReader::with_capacity(1024 * 1024, file);
    decode_reader(reader, &display)
}

/// 解析任意 reader 中的 XLIFF 内容（测试与内存数据使用）
pub fn decode_reader<R: std::io::BufRead>(
    source: R,
    origin: &str,
) -> TextDbResult<Vec<TransUnit>> {
    let mut reader = Reader::from_reader(source);
    reader.config_mut().trim_text(true);

    let mut units = Vec::with_capacity(1024);
    let mut buf = Vec::with_capacity(4096);

    let mut in_trans_unit = false;
    let mut in_source = false;
    let mut in_target = false;
    let mut has_target = false;
    let mut current_id = String::with_capacity(128);
    let mut current_source = String::with_capacity(256);
    let mut current_target = String::with_capacity(256);

    let decode_err = |reason: String| TextDbError::Decode {
        file: origin.to_string(),
        reason,
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"trans-unit" => {
                    in_trans_unit = true;
                    has_target = false;
                    current_id.clear();
                    current_source.clear();
                    current_target.clear();

                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"id" {
                            match std::str::from_utf8(&attr.value) {
                                Ok(id_str) => current_id.push_str(id_str),
                                Err(_) => {
                                    current_id = String::from_utf8_lossy(&attr.value).to_string();
                                }
                            }
                            break;
                        }
                    }
                }
                b"source" if in_trans_unit => {
                    in_source = true;
                    current_source.clear();
                }
                b"target" if in_trans_unit => {
                    in_target = true;
                    has_target = true;
                    current_target.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                // <target/> 等空元素：视为存在但为空，之后回退到 source
                if in_trans_unit && e.name().as_ref() == b"target" {
                    has_target = true;
                    current_target.clear();
                }
            }
            // unescape 只展开字符引用与五个预定义实体，
            // 未知实体引用报错（XXE 防线）
            Ok(Event::Text(ref e)) if in_source || in_target => {
                let text = e
                    .unescape()
                    .map_err(|e| decode_err(format!("malformed text content: {}", e)))?;
                if in_target {
                    current_target.push_str(&text);
                } else {
                    current_source.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"source" => in_source = false,
                b"target" => in_target = false,
                b"trans-unit" => {
                    in_trans_unit = false;

                    if !current_id.is_empty() {
                        let target = if has_target && !current_target.is_empty() {
                            current_target.clone()
                        } else {
                            // target 缺失或为空：回退 source
                            current_source.clone()
                        };

                        units.push(TransUnit {
                            id: current_id.clone(),
                            source: current_source.clone(),
                            target,
                        });

                        if units.len() > MAX_TRANS_UNITS {
                            return Err(decode_err(format!(
                                "too many trans-units (max: {})",
                                MAX_TRANS_UNITS
                            )));
                        }
                    }
                }
                _ => {}
            },
            // DOCTYPE 声明被忽略：不做任何 DTD/外部实体处理
            Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(decode_err(format!("XML parse error: {}", e))),
        }
        buf.clear();
    }

    debug!("[Xliff] Decoded {} trans-units from {}", units.len(), origin);
    Ok(units)
}
