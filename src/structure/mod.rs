//! Turns the code-generation stage's raw output into a [`FileMap`].
//!
//! Anything that cannot be read as a complete project is replaced by a
//! fixed example project. The replacement is reported as
//! [`CodeStructure::Fallback`] with its reason so it never passes for
//! generated code.

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::path::{Component, Path};
use std::sync::LazyLock;

/// Relative path to file content, in generation order.
pub type FileMap = IndexMap<String, String>;

/// Each marker must be a substring of at least one path.
pub const REQUIRED_MARKERS: [&str; 3] = ["main.cpp", ".h", "CMakeLists.txt"];

static FENCE_GREEDY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*)```").expect("fence pattern is valid"));
static FENCE_LAZY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)```").expect("fence pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    CompletionFailed(String),
    Malformed(String),
    UnsafePath(String),
    MissingRequired(Vec<&'static str>),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::CompletionFailed(e) => write!(f, "code generation request failed ({e})"),
            FallbackReason::Malformed(e) => write!(f, "response was not a file map ({e})"),
            FallbackReason::UnsafePath(p) => write!(f, "response contained an unsafe path: {p}"),
            FallbackReason::MissingRequired(m) => write!(f, "response lacked required files: {}", m.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeStructure {
    Parsed(FileMap),
    Fallback { files: FileMap, reason: FallbackReason },
}

impl CodeStructure {
    #[cfg(test)]
    pub fn files(&self) -> &FileMap {
        match self {
            CodeStructure::Parsed(f) | CodeStructure::Fallback { files: f, .. } => f,
        }
    }

    pub fn into_files(self) -> FileMap {
        match self {
            CodeStructure::Parsed(f) | CodeStructure::Fallback { files: f, .. } => f,
        }
    }

    pub fn fallback(reason: FallbackReason) -> Self {
        tracing::warn!(%reason, "using fallback project skeleton");
        CodeStructure::Fallback { files: fallback_skeleton(), reason }
    }
}

pub fn to_file_map(raw: &str) -> CodeStructure {
    match parse_file_map(raw) {
        Ok(files) => CodeStructure::Parsed(files),
        Err(reason) => CodeStructure::fallback(reason),
    }
}

fn parse_file_map(raw: &str) -> Result<FileMap, FallbackReason> {
    let object = candidates(raw)
        .into_iter()
        .find_map(|c| match serde_json::from_str::<Value>(&c) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .ok_or_else(|| FallbackReason::Malformed(first_parse_error(raw)))?;

    let mut entries = Vec::new();
    flatten("", object, &mut entries)?;

    let mut files = FileMap::new();
    for (key, content) in entries {
        if !is_safe_relative(&key) {
            return Err(FallbackReason::UnsafePath(key));
        }
        let path = normalize(&key);
        if let Some(clash) = files.keys().find(|k| overlaps(k, &path)) {
            return Err(FallbackReason::Malformed(format!("{key} collides with {clash}")));
        }
        files.insert(path, content);
    }

    let missing: Vec<&'static str> = REQUIRED_MARKERS
        .iter()
        .copied()
        .filter(|m| !files.keys().any(|k| k.contains(m)))
        .collect();
    if !missing.is_empty() {
        return Err(FallbackReason::MissingRequired(missing));
    }

    Ok(files)
}

/// Payload candidates, most specific first.
fn candidates(raw: &str) -> Vec<String> {
    let mut out = Vec::new();
    for re in [&*FENCE_GREEDY, &*FENCE_LAZY] {
        if let Some(c) = re.captures(raw).and_then(|c| c.get(1)) {
            out.push(c.as_str().trim().to_string());
        }
    }
    out.push(raw.trim().to_string());
    out.extend(balanced_objects(raw).into_iter().map(str::to_string));
    out
}

fn first_parse_error(raw: &str) -> String {
    let payload = candidates(raw).into_iter().next().unwrap_or_default();
    match serde_json::from_str::<Value>(&payload) {
        Ok(v) => format!("expected a JSON object, found {}", kind_of(&v)),
        Err(e) => e.to_string(),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Nested objects become directory prefixes: `{"src": {"a.cpp": ".."}}` → `src/a.cpp`.
fn flatten(
    prefix: &str,
    map: serde_json::Map<String, Value>,
    out: &mut Vec<(String, String)>,
) -> Result<(), FallbackReason> {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{}/{}", prefix.trim_end_matches('/'), key)
        };
        match value {
            Value::String(content) => out.push((path, content)),
            Value::Object(inner) => flatten(&path, inner, out)?,
            other => {
                return Err(FallbackReason::Malformed(format!(
                    "{path}: expected file content, found {}",
                    kind_of(&other)
                )))
            }
        }
    }
    Ok(())
}

/// Non-empty, relative, and never climbing out of the project root.
pub fn is_safe_relative(candidate: &str) -> bool {
    if candidate.trim().is_empty() || candidate.contains('\\') {
        return false;
    }
    Path::new(candidate)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// `a/./b//c` → `a/b/c`. Only meaningful for keys that passed [`is_safe_relative`].
fn normalize(key: &str) -> String {
    Path::new(key)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Same file, or one path is a directory of the other.
fn overlaps(a: &str, b: &str) -> bool {
    let under = |path: &str, dir: &str| path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'));
    a == b || under(a, b) || under(b, a)
}

/// Every balanced top-level `{...}` substring, skipping braces inside string literals.
fn balanced_objects(s: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in s.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if start.is_some() => in_string = true,
            b'{' => {
                start.get_or_insert(i);
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(st) = start.take() {
                        found.push(&s[st..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    found
}

const FALLBACK_HEADER: &str = r#"#pragma once

#include <cstdint>

namespace app {

class Controller {
public:
    void init();
    void update(std::uint32_t now_ms);
    std::uint32_t ticks() const { return ticks_; }

private:
    std::uint32_t ticks_ = 0;
    std::uint32_t last_ms_ = 0;
};

} // namespace app
"#;

const FALLBACK_IMPL: &str = r#"#include "app.h"

namespace app {

void Controller::init() {
    ticks_ = 0;
    last_ms_ = 0;
}

void Controller::update(std::uint32_t now_ms) {
    if (now_ms - last_ms_ >= 10) {
        last_ms_ = now_ms;
        ++ticks_;
    }
}

} // namespace app
"#;

const FALLBACK_MAIN: &str = r#"#include "app.h"

#include <cstdio>

int main() {
    app::Controller controller;
    controller.init();
    for (std::uint32_t t = 0; t <= 100; t += 5) {
        controller.update(t);
    }
    std::printf("ticks: %u\n", static_cast<unsigned>(controller.ticks()));
    return 0;
}
"#;

const FALLBACK_CMAKE: &str = r#"cmake_minimum_required(VERSION 3.16)
project(embedded_app CXX)

set(CMAKE_CXX_STANDARD 17)
set(CMAKE_CXX_STANDARD_REQUIRED ON)

add_library(app src/app.cpp)
target_include_directories(app PUBLIC include)

add_executable(embedded_app src/main.cpp)
target_link_libraries(embedded_app PRIVATE app)

enable_testing()
add_executable(test_app tests/test_app.cpp)
target_link_libraries(test_app PRIVATE app)
add_test(NAME test_app COMMAND test_app)
"#;

const FALLBACK_TEST: &str = r#"#include "app.h"

#include <cassert>

int main() {
    app::Controller c;
    c.init();
    c.update(5);
    assert(c.ticks() == 0);
    c.update(10);
    assert(c.ticks() == 1);
    return 0;
}
"#;

const FALLBACK_README: &str = r#"# Embedded App

Example project skeleton. It was produced because the generated code could
not be read as a project; regenerate the code stage to get your own.

## Build

    cmake -S . -B build
    cmake --build build
    ctest --test-dir build
"#;

/// The fixed example project; independent of any input.
pub fn fallback_skeleton() -> FileMap {
    [
        ("include/app.h", FALLBACK_HEADER),
        ("src/app.cpp", FALLBACK_IMPL),
        ("src/main.cpp", FALLBACK_MAIN),
        ("CMakeLists.txt", FALLBACK_CMAKE),
        ("tests/test_app.cpp", FALLBACK_TEST),
        ("README.md", FALLBACK_README),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "CMakeLists.txt": "project(x)\n",
            "include/sensor.h": "#pragma once\nint read();\n",
            "src/main.cpp": "#include \"sensor.h\"\nint main() {\n  return read();\n}\n",
        })
    }

    fn keys(map: &FileMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn valid_map_round_trips_in_order() {
        let raw = serde_json::to_string_pretty(&valid_payload()).unwrap();
        let CodeStructure::Parsed(files) = to_file_map(&raw) else {
            panic!("expected parsed");
        };
        assert_eq!(keys(&files), ["CMakeLists.txt", "include/sensor.h", "src/main.cpp"]);
        assert_eq!(files["src/main.cpp"], "#include \"sensor.h\"\nint main() {\n  return read();\n}\n");
    }

    #[test]
    fn fenced_payload_with_prose_and_inner_fences() {
        let mut payload = valid_payload();
        payload["README.md"] = json!("# Demo\n```\ncmake -S . -B build\n```\n");
        let raw = format!(
            "Here is your project:\n```json\n{}\n```",
            serde_json::to_string_pretty(&payload).unwrap()
        );
        let s = to_file_map(&raw);
        assert!(matches!(s, CodeStructure::Parsed(_)), "{s:?}");
        assert!(s.files()["README.md"].contains("cmake -S"));
    }

    #[test]
    fn object_embedded_in_prose_is_found() {
        let raw = format!(
            "Sure! {} Let me know if you need more {{help}}.",
            serde_json::to_string(&valid_payload()).unwrap()
        );
        assert!(matches!(to_file_map(&raw), CodeStructure::Parsed(_)));
    }

    #[test]
    fn nested_directories_are_flattened() {
        let raw = json!({
            "CMakeLists.txt": "",
            "include": { "a.h": "" },
            "src": { "main.cpp": "", "drivers": { "uart.cpp": "x" } }
        })
        .to_string();
        let s = to_file_map(&raw);
        assert_eq!(
            keys(s.files()),
            ["CMakeLists.txt", "include/a.h", "src/main.cpp", "src/drivers/uart.cpp"]
        );
    }

    #[test]
    fn malformed_text_falls_back() {
        let s = to_file_map("Directory structure:\n- src/\n  - main.cpp");
        let CodeStructure::Fallback { files, reason } = s else {
            panic!("expected fallback");
        };
        assert!(matches!(reason, FallbackReason::Malformed(_)));
        assert_eq!(files, fallback_skeleton());
    }

    #[test]
    fn missing_markers_fall_back_and_name_them() {
        let raw = json!({ "src/main.cpp": "int main(){}" }).to_string();
        match to_file_map(&raw) {
            CodeStructure::Fallback { reason: FallbackReason::MissingRequired(m), .. } => {
                assert_eq!(m, vec![".h", "CMakeLists.txt"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_string_values_and_unsafe_paths_fall_back() {
        let numbers = json!({ "CMakeLists.txt": 1, "a.h": "", "main.cpp": "" }).to_string();
        assert!(matches!(
            to_file_map(&numbers),
            CodeStructure::Fallback { reason: FallbackReason::Malformed(_), .. }
        ));

        let escape = json!({ "CMakeLists.txt": "", "a.h": "", "../main.cpp": "" }).to_string();
        assert!(matches!(
            to_file_map(&escape),
            CodeStructure::Fallback { reason: FallbackReason::UnsafePath(_), .. }
        ));
    }

    #[test]
    fn fallback_is_constant_and_satisfies_its_own_markers() {
        let a = fallback_skeleton();
        let b = to_file_map("").into_files();
        assert_eq!(keys(&a), keys(&b));
        for m in REQUIRED_MARKERS {
            assert!(a.keys().any(|k| k.contains(m)), "{m}");
        }
        assert!(a.keys().all(|k| is_safe_relative(k)));
    }

    #[test]
    fn safe_relative_paths() {
        assert!(is_safe_relative("src/main.cpp"));
        assert!(is_safe_relative("./README.md"));
        assert!(!is_safe_relative("/etc/passwd"));
        assert!(!is_safe_relative("src/../../x"));
        assert!(!is_safe_relative("   "));
        assert!(!is_safe_relative("src\\main.cpp"));
    }

    #[test]
    fn balanced_objects_ignore_braces_in_strings() {
        let s = r#"noise {"a.h": "struct S { int x; };"} tail } {"b": "}"}"#;
        assert_eq!(balanced_objects(s), [r#"{"a.h": "struct S { int x; };"}"#, r#"{"b": "}"}"#]);
    }

    #[test]
    fn later_object_is_used_when_an_earlier_one_is_prose() {
        let raw = format!(
            "This firmware targets the {{STM32}} family. Project:\n{}",
            serde_json::to_string_pretty(&valid_payload()).unwrap()
        );
        let s = to_file_map(&raw);
        assert!(matches!(s, CodeStructure::Parsed(_)), "{s:?}");
    }

    #[test]
    fn keys_are_normalized_to_plain_relative_paths() {
        let raw = json!({
            "CMakeLists.txt": "",
            "./include//p.h": "",
            "src": { "./main.cpp": "x" }
        })
        .to_string();
        let CodeStructure::Parsed(files) = to_file_map(&raw) else {
            panic!("expected parsed");
        };
        assert_eq!(keys(&files), ["CMakeLists.txt", "include/p.h", "src/main.cpp"]);
    }

    #[test]
    fn keys_naming_the_same_file_fall_back() {
        let raw = json!({
            "CMakeLists.txt": "",
            "include/p.h": "A\n",
            "./include/p.h": "B\n",
            "src/main.cpp": ""
        })
        .to_string();
        assert!(matches!(
            to_file_map(&raw),
            CodeStructure::Fallback { reason: FallbackReason::Malformed(_), .. }
        ));
    }

    #[test]
    fn file_that_is_also_a_directory_falls_back() {
        let raw = json!({
            "CMakeLists.txt": "",
            "include/p.h": "",
            "src": "oops",
            "src/main.cpp": ""
        })
        .to_string();
        assert!(matches!(
            to_file_map(&raw),
            CodeStructure::Fallback { reason: FallbackReason::Malformed(_), .. }
        ));
        assert!(overlaps("src/main.cpp", "src"));
        assert!(!overlaps("src2/main.cpp", "src"));
    }
}
