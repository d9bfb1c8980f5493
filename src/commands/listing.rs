//! ls 命令：列出目录的直接子项

use crate::remote::RemoteEntry;

/// 按列对齐输出：类型、大小、名称、路径
pub fn render_listing(entries: &[RemoteEntry]) -> Vec<String> {
    let rows: Vec<[String; 4]> = entries
        .iter()
        .map(|entry| {
            let size = match entry {
                RemoteEntry::File { size, .. } => size.to_string(),
                _ => "-".to_string(),
            };
            [
                entry.kind().to_string(),
                size,
                entry.name().to_string(),
                entry.path().display().to_string(),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    rows.iter()
        .map(|[kind, size, name, path]| {
            format!(
                "{:<kw$} {:>sw$} {:>nw$} {:>pw$}",
                kind,
                size,
                name,
                path,
                kw = widths[0],
                sw = widths[1],
                nw = widths[2],
                pw = widths[3]
            )
        })
        .collect()
}
