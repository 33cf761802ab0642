use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeZone, Utc};
use log::{error, warn};

use crate::param::{MIME_TYPES, STATUS_CODES};

/// 错误页构建器
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{}", code);
        let css = r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
        .to_string();
        let description = match note {
            Some(n) => n,
            None => match STATUS_CODES.get(&code) {
                Some(d) => *d,
                None => {
                    error!("非法的状态码：{}", code);
                    "Unknown"
                }
            },
        };
        let body = format!(
            r"
            <h1>{}</h1>
            <p>{}</p>
            ",
            code,
            escape_html(description)
        );
        Self { title, css, body }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

/// 配置文件中的布尔值约定：大小写不敏感的 `false` 与 `no` 为假，其余一律为真。
///
/// 注意 `"0"` 在这个约定下是真。
pub fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    !(value.eq_ignore_ascii_case("false") || value.eq_ignore_ascii_case("no"))
}

/// 逗号分隔的角色列表：去掉首尾空白，保留顺序，丢弃空项
pub fn parse_roles(roles: &str) -> Vec<String> {
    roles
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// 响应头中使用的 HTTP 日期格式（IMF-fixdate）
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 表示"已过期"的日期，用于禁止缓存的 `Expires` 头
pub fn expired_date() -> DateTime<Utc> {
    match Utc.timestamp_opt(1, 0).single() {
        Some(date) => date,
        None => Utc::now(),
    }
}

pub fn get_mime(path: &Path) -> &'static str {
    let extension = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_lowercase(),
        None => return "application/octet-stream",
    };
    match MIME_TYPES.get(extension.as_str()) {
        Some(v) => *v,
        None => {
            error!("无法识别的文件扩展名：{}", extension);
            "application/octet-stream"
        }
    }
}

/// 获取互斥锁；锁被污染时恢复并继续使用内部数据
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("互斥锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

pub fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("读写锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

pub fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("读写锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
