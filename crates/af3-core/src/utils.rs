pub const OUTPUT_PREVIEW_MAX_LINES: usize = 3;
pub const OUTPUT_PREVIEW_MAX_CHARS_PER_LINE: usize = 40;

/// 截断子进程输出用于日志展示（前几行，每行截断）
pub fn truncate_output_preview(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    let mut lines = s.lines();
    let mut wrote_any = false;

    for (i, line) in lines.by_ref().take(OUTPUT_PREVIEW_MAX_LINES).enumerate() {
        if i > 0 {
            out.push('\n');
        }

        let mut chars = line.chars();
        out.extend(chars.by_ref().take(OUTPUT_PREVIEW_MAX_CHARS_PER_LINE));
        if chars.next().is_some() {
            out.push_str("...");
        }

        wrote_any = true;
    }

    if wrote_any && lines.next().is_some() {
        out.push_str("\n...");
    }

    out
}

/// 取 stderr 末尾若干行用于失败上报
///
/// 管线失败时真正有用的信息几乎总在末尾（Python traceback、
/// CUDA OOM 等），开头往往是冗长的启动日志。
pub fn stderr_tail(s: &str, max_lines: usize) -> String {
    if s.is_empty() || max_lines == 0 {
        return String::new();
    }

    let lines: Vec<&str> = s.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    let mut out = String::new();
    if start > 0 {
        out.push_str("...\n");
    }
    out.push_str(&lines[start..].join("\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_lines() {
        let long = "x".repeat(100);
        let preview = truncate_output_preview(&long);
        assert!(preview.ends_with("..."));
        assert!(preview.len() < long.len());
    }

    #[test]
    fn test_preview_marks_extra_lines() {
        let text = "one\ntwo\nthree\nfour\nfive";
        let preview = truncate_output_preview(text);
        assert!(preview.contains("one"));
        assert!(preview.ends_with("\n..."));
        assert!(!preview.contains("four"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let text = "boot line\nloading weights\nTraceback (most recent call last):\nValueError: bad input";
        let tail = stderr_tail(text, 2);
        assert!(tail.starts_with("...\n"));
        assert!(tail.contains("Traceback"));
        assert!(tail.contains("ValueError: bad input"));
        assert!(!tail.contains("boot line"));
    }

    #[test]
    fn test_stderr_tail_short_input_unchanged() {
        assert_eq!(stderr_tail("only line", 5), "only line");
        assert_eq!(stderr_tail("", 5), "");
    }
}
