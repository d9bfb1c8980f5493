//! 噪声过滤规则：构建产物、版本控制目录、已删除 / 回收站条目

use crate::remote::RemoteEntry;
use regex::Regex;
use std::fmt;

/// 构建产物扩展名（小写比较）
const BUILD_EXTENSIONS: &[&str] = &[
    // Python
    ".pyc", ".pyo", ".pyd",
    // C / C++
    ".o", ".obj", ".so", ".dylib", ".dll", ".a", ".lib",
    // JVM
    ".class", ".jar", ".war", ".ear",
    // .NET
    ".exe", ".out",
    // Python 打包
    ".whl", ".egg",
];

/// 构建 / 缓存目录名（精确匹配）
const BUILD_DIR_NAMES: &[&str] = &[
    "__pycache__",
    "node_modules",
    ".tox",
    ".nox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    ".cache",
    ".eggs",
    ".build",
    ".gradle",
    "target",
    "bower_components",
    ".sass-cache",
    ".parcel-cache",
    ".next",
    ".nuxt",
    ".turbo",
    "dist-newstyle",
    "__pypackages__",
    ".venv",
    "venv",
    "env",
];

/// 针对条目名称的 glob 规则
const BUILD_NAME_GLOBS: &[&str] = &["*.egg-info"];

const GIT_NAMES: &[&str] = &[".git"];

/// 回收站路径片段（针对小写完整路径）
const TRASH_PATH_SEGMENTS: &[&str] = &["/.dropbox.cache/"];

/// 系统文件名（小写比较）
const SYSTEM_NAMES: &[&str] = &[".dropbox", ".dropbox.attr"];

/// 跳过原因的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCategory {
    Build,
    Git,
    Deleted,
}

impl fmt::Display for SkipCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCategory::Build => write!(f, "build"),
            SkipCategory::Git => write!(f, "git"),
            SkipCategory::Deleted => write!(f, "deleted"),
        }
    }
}

/// 过滤结果；`reason` 以分类为前缀，例如 `build: file extension .o`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDecision {
    pub skip: bool,
    pub reason: String,
    pub category: Option<SkipCategory>,
}

impl SkipDecision {
    pub fn keep() -> Self {
        Self {
            skip: false,
            reason: String::new(),
            category: None,
        }
    }

    fn skip(category: SkipCategory, detail: impl fmt::Display) -> Self {
        Self {
            skip: true,
            reason: format!("{}: {}", category, detail),
            category: Some(category),
        }
    }
}

/// 噪声过滤器
///
/// 未启用时所有条目都保留；启用后按固定优先级匹配，第一条命中的规则生效。
#[derive(Debug, Clone)]
pub struct SkipFilter {
    enabled: bool,
    name_globs: Vec<(&'static str, Regex)>,
}

impl SkipFilter {
    pub fn new(enabled: bool) -> Self {
        let name_globs = BUILD_NAME_GLOBS
            .iter()
            .filter_map(|glob| glob_to_regex(glob).map(|re| (*glob, re)))
            .collect();

        Self {
            enabled,
            name_globs,
        }
    }

    /// 判断完整的远程条目是否应跳过
    pub fn decision(&self, entry: &RemoteEntry) -> SkipDecision {
        if !self.enabled {
            return SkipDecision::keep();
        }

        if let RemoteEntry::Deleted { .. } = entry {
            return SkipDecision::skip(SkipCategory::Deleted, "remote entry marked as deleted");
        }

        let path_lower = entry.path().lower();
        let decision = self.decision_by_name(path_lower, entry.name());
        if decision.skip {
            return decision;
        }

        // 路径中任一段是构建 / git 目录：捕获单独到达的深层条目
        for part in path_lower.split('/') {
            if BUILD_DIR_NAMES.contains(&part) {
                return SkipDecision::skip(
                    SkipCategory::Build,
                    format!("inside build/cache directory ({})", part),
                );
            }
            if GIT_NAMES.contains(&part) {
                return SkipDecision::skip(
                    SkipCategory::Git,
                    format!("inside version-control directory ({})", part),
                );
            }
        }

        SkipDecision::keep()
    }

    /// 只依赖小写路径和名称的轻量判断（不含已删除类型与路径分段检查）
    pub fn decision_by_name(&self, path_lower: &str, name: &str) -> SkipDecision {
        if !self.enabled {
            return SkipDecision::keep();
        }

        if SYSTEM_NAMES.contains(&name.to_lowercase().as_str()) {
            return SkipDecision::skip(SkipCategory::Deleted, format!("system file ({})", name));
        }

        if let Some(segment) = TRASH_PATH_SEGMENTS
            .iter()
            .find(|segment| path_lower.contains(*segment))
        {
            return SkipDecision::skip(
                SkipCategory::Deleted,
                format!("path contains trash segment ({})", segment.trim_matches('/')),
            );
        }

        if GIT_NAMES.contains(&name) {
            return SkipDecision::skip(
                SkipCategory::Git,
                format!("version-control directory ({})", name),
            );
        }

        if let Some(ext) = extension(name) {
            if BUILD_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                return SkipDecision::skip(SkipCategory::Build, format!("file extension {}", ext));
            }
        }

        if BUILD_DIR_NAMES.contains(&name) {
            return SkipDecision::skip(
                SkipCategory::Build,
                format!("build/cache directory ({})", name),
            );
        }

        if let Some((glob, _)) = self.name_globs.iter().find(|(_, re)| re.is_match(name)) {
            return SkipDecision::skip(
                SkipCategory::Build,
                format!("name matches pattern ({})", glob),
            );
        }

        SkipDecision::keep()
    }
}

/// 最后一个扩展名（含点），忽略开头的点：`.bashrc` 没有扩展名
fn extension(name: &str) -> Option<&str> {
    let leading = name.len() - name.trim_start_matches('.').len();
    let idx = name[leading..].rfind('.')?;
    Some(&name[leading + idx..])
}

/// 简单的 glob 转正则（支持 `*` 与 `?`）
fn glob_to_regex(glob: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).ok()
}
