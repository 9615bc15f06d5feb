//! Manage page markup
//!
//! Rendered inline: one table row per record with a delete form, followed by
//! an add form posting to `/add`.

use morg_common::db::ModelRecord;

/// Escape text for HTML element and attribute content
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_row(record: &ModelRecord) -> String {
    format!(
        r#"            <tr>
                <td>{id}</td>
                <td>{creator}</td>
                <td>{model}</td>
                <td>{file_type}</td>
                <td>{filename}</td>
                <td>{original}</td>
                <td>{created}</td>
                <td>
                    <form method="post" action="/delete/{id}">
                        <button type="submit" class="danger">Delete</button>
                    </form>
                </td>
            </tr>
"#,
        id = record.id,
        creator = escape_html(&record.creator),
        model = escape_html(&record.model),
        file_type = escape_html(&record.file_type),
        filename = escape_html(&record.filename),
        original = escape_html(record.original_filename.as_deref().unwrap_or("")),
        created = record.created_at.format("%Y-%m-%d %H:%M"),
    )
}

/// Full HTML page for `GET /manage`
pub fn render_manage_page(records: &[ModelRecord]) -> String {
    let rows = if records.is_empty() {
        "            <tr><td colspan=\"8\" class=\"empty\">No models recorded yet</td></tr>\n"
            .to_string()
    } else {
        records.iter().map(render_row).collect::<String>()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Model Organizer - Manage</title>
    <style>
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            margin: 0;
            padding: 20px;
        }}
        h1, h2 {{ color: #4a9eff; }}
        table {{ border-collapse: collapse; width: 100%; margin-bottom: 30px; }}
        th, td {{ border-bottom: 1px solid #3a3a3a; padding: 8px; text-align: left; }}
        th {{ background-color: #2a2a2a; }}
        td.empty {{ color: #888; text-align: center; }}
        form.add {{ display: grid; grid-template-columns: 160px 300px; gap: 8px; }}
        input {{ background: #2a2a2a; color: #e0e0e0; border: 1px solid #3a3a3a; padding: 4px; }}
        button {{ background: #4a9eff; color: #fff; border: none; padding: 6px 12px; cursor: pointer; }}
        button.danger {{ background: #c0392b; }}
        .build-info {{ color: #888; font-family: 'Courier New', monospace; font-size: 12px; }}
    </style>
</head>
<body>
    <h1>Model Records ({count})</h1>
    <table>
        <thead>
            <tr>
                <th>ID</th><th>Creator</th><th>Model</th><th>Type</th>
                <th>Filename</th><th>Original filename</th><th>Added</th><th></th>
            </tr>
        </thead>
        <tbody>
{rows}        </tbody>
    </table>

    <h2>Add Entry</h2>
    <form class="add" method="post" action="/add">
        <label for="creator">Creator</label>
        <input id="creator" name="creator" maxlength="80" required>
        <label for="model">Model</label>
        <input id="model" name="model" maxlength="120" required>
        <label for="file_type">File type</label>
        <input id="file_type" name="file_type" maxlength="20" required>
        <label for="filename">Filename</label>
        <input id="filename" name="filename" maxlength="120" required>
        <label for="original_filename">Original filename</label>
        <input id="original_filename" name="original_filename" maxlength="120">
        <span></span>
        <button type="submit">Add</button>
    </form>

    <p class="build-info">morg-ai v{version} [{git_hash}] built {timestamp} ({profile})</p>
</body>
</html>
"#,
        count = records.len(),
        rows = rows,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        timestamp = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
    )
}
