/// 현재 플랫폼에서 경로 구성요소에 쓸 수 없는 문자.
fn is_reserved(c: char) -> bool {
    match c {
        '/' | '\0' => true,
        c if c.is_whitespace() => false,
        ':' => cfg!(any(target_os = "windows", target_os = "macos")),
        '\\' | '*' | '?' | '"' | '<' | '>' | '|' => cfg!(target_os = "windows"),
        c if c.is_ascii_control() => cfg!(target_os = "windows"),
        _ => false,
    }
}

const MAX_FOLDER_CHARS: usize = 120;

/// 앨범/플레이리스트 이름을 하위 폴더 이름으로 바꾼다.
///
/// 예약 문자는 `_`로 치환하고, 공백을 정리하며, 앞쪽 `.`을 제거해
/// 출력 디렉토리 밖이나 숨김 폴더로 빠지지 않게 한다. 남는 것이 없으면 None.
pub fn folder_name(title: &str) -> Option<String> {
    let replaced: String = title
        .chars()
        .map(|c| if is_reserved(c) { '_' } else { c })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let name: String = collapsed
        .trim_start_matches('.')
        .trim()
        .chars()
        .take(MAX_FOLDER_CHARS)
        .collect();

    let name = name.trim_end().to_string();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_and_null_are_replaced() {
        assert_eq!(folder_name("Rock/Pop\0Mix").as_deref(), Some("Rock_Pop_Mix"));
    }

    #[test]
    fn test_plain_titles_are_kept() {
        assert_eq!(folder_name("Today's Top Hits").as_deref(), Some("Today's Top Hits"));
        assert_eq!(folder_name("아이유 - 좋은날").as_deref(), Some("아이유 - 좋은날"));
    }

    #[test]
    fn test_cannot_escape_output_dir() {
        assert_eq!(folder_name("../secret").as_deref(), Some("_secret"));
        assert_eq!(folder_name(".hidden").as_deref(), Some("hidden"));
        assert_eq!(folder_name(".."), None);
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(folder_name("  Chill \t  Vibes \n").as_deref(), Some("Chill Vibes"));
        assert_eq!(folder_name("   "), None);
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let long = "x".repeat(500);
        assert_eq!(folder_name(&long).map(|n| n.chars().count()), Some(MAX_FOLDER_CHARS));
    }
}
