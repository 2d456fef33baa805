use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn view_ids(result: &serde_json::Value) -> Vec<i64> {
    result
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array")
        .iter()
        .map(|s| s.get("id").and_then(|v| v.as_i64()).expect("student id"))
        .collect()
}

/// Seed four students, load the board, start a roll and mark three of them
/// (one stays unmarked). Returns the roster ids in insertion order.
fn marked_board(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Vec<i64> {
    let workspace = temp_dir("rollcall-filter");
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let names = [
        ("Jane", "Doe"),
        ("John", "Smith"),
        ("Amy", "Apple"),
        ("Bob", "Zed"),
    ];
    let mut ids = Vec::new();
    for (i, (first, last)) in names.iter().enumerate() {
        let created = request_ok(
            stdin,
            reader,
            &format!("seed-{}", i),
            "students.create",
            json!({ "firstName": first, "lastName": last }),
        );
        ids.push(
            created
                .get("studentId")
                .and_then(|v| v.as_i64())
                .expect("studentId"),
        );
    }
    let _ = request_ok(stdin, reader, "load", "homeboard.load", json!({}));
    let _ = request_ok(stdin, reader, "roll", "roll.start", json!({}));
    for (i, state) in [(0, "present"), (1, "late"), (2, "absent")] {
        let _ = request_ok(
            stdin,
            reader,
            &format!("mark-{}", i),
            "roll.mark",
            json!({ "studentId": ids[i], "state": state }),
        );
    }
    ids
}

#[test]
fn state_filters_partition_the_marked_students() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ids = marked_board(&mut stdin, &mut reader);

    let mut seen = Vec::new();
    for (i, state) in ["present", "late", "absent"].iter().enumerate() {
        let filtered = request_ok(
            &mut stdin,
            &mut reader,
            &format!("f-{}", i),
            "homeboard.filter",
            json!({ "state": state }),
        );
        let bucket = view_ids(&filtered);
        assert_eq!(bucket, vec![ids[i]], "bucket for {}", state);
        seen.extend(bucket);
    }
    // No overlap, no omission among the marked three; the unmarked student
    // appears in none of the concrete buckets.
    seen.sort_unstable();
    assert_eq!(seen, {
        let mut marked = ids[..3].to_vec();
        marked.sort_unstable();
        marked
    });
}

#[test]
fn switching_chips_rederives_from_the_full_list() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ids = marked_board(&mut stdin, &mut reader);

    let present = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "homeboard.filter",
        json!({ "state": "present" }),
    );
    assert_eq!(view_ids(&present), vec![ids[0]]);

    // The late student was excluded from the previous view; a compounding
    // filter-of-filter would return nothing here.
    let late = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "homeboard.filter",
        json!({ "state": "late" }),
    );
    assert_eq!(view_ids(&late), vec![ids[1]]);

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "homeboard.filter",
        json!({ "state": "all" }),
    );
    assert_eq!(view_ids(&all), ids);
}

#[test]
fn unknown_state_key_yields_an_empty_view_not_an_error() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ids = marked_board(&mut stdin, &mut reader);

    let filtered = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "homeboard.filter",
        json!({ "state": "excused" }),
    );
    assert!(view_ids(&filtered).is_empty());
}

#[test]
fn clear_after_repeated_filters_restores_the_exact_full_list() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ids = marked_board(&mut stdin, &mut reader);

    for (i, state) in ["absent", "present", "absent"].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("f-{}", i),
            "homeboard.filter",
            json!({ "state": state }),
        );
    }
    let cleared = request_ok(&mut stdin, &mut reader, "clear", "homeboard.clear", json!({}));
    assert_eq!(view_ids(&cleared), ids);

    // Marks made before filtering survive the snapshot restore.
    let counts = request_ok(&mut stdin, &mut reader, "counts", "roll.counts", json!({}));
    assert_eq!(counts.get("presentCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(counts.get("lateCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(counts.get("absentCount").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn marks_made_while_filtered_survive_the_restore() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let ids = marked_board(&mut stdin, &mut reader);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "homeboard.filter",
        json!({ "state": "present" }),
    );
    // Mark the still-unmarked student while the view is narrowed.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "roll.mark",
        json!({ "studentId": ids[3], "state": "present" }),
    );
    let cleared = request_ok(&mut stdin, &mut reader, "3", "homeboard.clear", json!({}));
    assert_eq!(view_ids(&cleared), ids);
    let counts = request_ok(&mut stdin, &mut reader, "4", "roll.counts", json!({}));
    assert_eq!(counts.get("presentCount").and_then(|v| v.as_u64()), Some(2));
}
