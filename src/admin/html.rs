//! HTML rendering for the admin console. Every interpolated value goes
//! through `escape`.

use std::fmt::Write;

use super::forms::{FieldKind, FormField, FormValues};
use super::models::{AdminModel, Row};
use crate::validation::{FieldErrors, NON_FIELD};

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Wrap `body` in the console layout. `user` is the signed-in staff email.
pub fn page(title: &str, user: Option<&str>, body: &str) -> String {
    let nav = match user {
        Some(email) => format!(
            r#"<nav><a href="/admin">Site administration</a>
<form method="post" action="/admin/logout" class="logout"><span>{}</span> <button type="submit">Log out</button></form></nav>"#,
            escape(email)
        ),
        None => String::new(),
    };
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Curesio admin</title>
<style>
body{{margin:0;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#fafaf9;color:#1c1917}}
header{{background:#0f766e;color:#fff;padding:12px 24px}}
header h1{{margin:0;font-size:1.2rem}}
nav{{display:flex;justify-content:space-between;align-items:center;padding:8px 24px;background:#e7e5e4}}
nav a{{color:#0f766e}}
.logout{{margin:0}}
main{{padding:24px;max-width:1100px}}
table{{border-collapse:collapse;width:100%;background:#fff}}
th,td{{text-align:left;padding:6px 10px;border-bottom:1px solid #e7e5e4}}
label{{display:block;font-weight:600;margin-top:12px}}
input[type=text],input[type=email],input[type=password],input[type=number],input[type=date],textarea,select{{width:100%;max-width:480px;padding:6px}}
.errorlist{{color:#b91c1c;margin:4px 0;padding-left:18px}}
.help{{color:#78716c;font-size:.85rem}}
.actions{{margin-top:20px;display:flex;gap:12px;align-items:center}}
.deletelink{{color:#b91c1c}}
</style>
</head>
<body>
<header><h1>Curesio administration</h1></header>
{nav}
<main>
<h2>{title}</h2>
{body}
</main>
</body>
</html>"##,
        title = escape(title),
    )
}

fn error_list(messages: Option<&[String]>) -> String {
    let Some(messages) = messages.filter(|m| !m.is_empty()) else {
        return String::new();
    };
    let mut out = String::from(r#"<ul class="errorlist">"#);
    for message in messages {
        let _ = write!(out, "<li>{}</li>", escape(message));
    }
    out.push_str("</ul>");
    out
}

fn options(choices: &[(String, String)], selected: &[String], blank: bool) -> String {
    let mut out = String::new();
    if blank {
        out.push_str(r#"<option value="">---------</option>"#);
    }
    for (value, label) in choices {
        let mark = if selected.contains(value) { " selected" } else { "" };
        let _ = write!(
            out,
            r#"<option value="{}"{mark}>{}</option>"#,
            escape(value),
            escape(label)
        );
    }
    out
}

fn input(field: &FormField, values: &FormValues) -> String {
    let name = escape(&field.name);
    let value = escape(values.text(&field.name));
    match &field.kind {
        FieldKind::Text => format!(r#"<input type="text" id="{name}" name="{name}" value="{value}">"#),
        FieldKind::Email => format!(r#"<input type="email" id="{name}" name="{name}" value="{value}">"#),
        FieldKind::Number => format!(r#"<input type="number" id="{name}" name="{name}" value="{value}">"#),
        FieldKind::Date => format!(r#"<input type="date" id="{name}" name="{name}" value="{value}">"#),
        // Passwords are never echoed back.
        FieldKind::Password => format!(r#"<input type="password" id="{name}" name="{name}" value="">"#),
        FieldKind::TextArea => format!(r#"<textarea id="{name}" name="{name}" rows="5">{value}</textarea>"#),
        FieldKind::Checkbox => {
            let mark = if values.checked(&field.name) { " checked" } else { "" };
            format!(r#"<input type="checkbox" id="{name}" name="{name}"{mark}>"#)
        }
        FieldKind::Select { choices, blank } => format!(
            r#"<select id="{name}" name="{name}">{}</select>"#,
            options(choices, values.all(&field.name), *blank)
        ),
        FieldKind::MultiSelect(choices) => format!(
            r#"<select id="{name}" name="{name}" multiple size="6">{}</select>"#,
            options(choices, values.all(&field.name), false)
        ),
    }
}

/// Render an edit/create form with inline errors.
pub fn form(
    action: &str,
    fields: &[FormField],
    values: &FormValues,
    errors: &FieldErrors,
    delete_url: Option<&str>,
) -> String {
    let mut out = String::new();
    if !errors.is_empty() {
        out.push_str(r#"<p class="errornote">Please correct the errors below.</p>"#);
    }
    out.push_str(&error_list(errors.get(NON_FIELD)));
    let _ = write!(out, r#"<form method="post" action="{}">"#, escape(action));
    for field in fields {
        let _ = write!(
            out,
            r#"<div class="field"><label for="{}">{}</label>{}{}"#,
            escape(&field.name),
            escape(field.label),
            error_list(errors.get(&field.name)),
            input(field, values)
        );
        if let Some(help) = field.help {
            let _ = write!(out, r#"<div class="help">{}</div>"#, escape(help));
        }
        out.push_str("</div>");
    }
    out.push_str(r#"<div class="actions"><button type="submit">Save</button>"#);
    if let Some(url) = delete_url {
        let _ = write!(out, r#"<a class="deletelink" href="{}">Delete</a>"#, escape(url));
    }
    out.push_str("</div></form>");
    out
}

/// Render the change list with a search box.
pub fn change_list(model: &dyn AdminModel, rows: &[Row], query: Option<&str>) -> String {
    let slug = model.slug();
    let mut out = format!(
        r#"<form method="get" action="/admin/{slug}"><input type="text" name="q" value="{}"> <button type="submit">Search</button></form>"#,
        escape(query.unwrap_or_default())
    );
    if model.can_create() {
        let _ = write!(out, r#"<p><a href="/admin/{slug}/new">Add {}</a></p>"#, escape(model.singular()));
    }
    out.push_str("<table><thead><tr>");
    for column in model.columns() {
        let _ = write!(out, "<th>{}</th>", escape(column));
    }
    out.push_str("</tr></thead><tbody>");
    for row in rows {
        out.push_str("<tr>");
        for (i, cell) in row.cells.iter().enumerate() {
            if i == 0 {
                let _ = write!(
                    out,
                    r#"<td><a href="/admin/{slug}/{}">{}</a></td>"#,
                    row.id,
                    escape(cell)
                );
            } else {
                let _ = write!(out, "<td>{}</td>", escape(cell));
            }
        }
        out.push_str("</tr>");
    }
    let _ = write!(out, "</tbody></table><p>{} {}</p>", rows.len(), escape(model.title()).to_lowercase());
    out
}

/// Render the model index.
pub fn index(models: &[&dyn AdminModel]) -> String {
    let mut out = String::from("<table><tbody>");
    for model in models {
        let _ = write!(
            out,
            r#"<tr><th><a href="/admin/{}">{}</a></th><td>{}</td></tr>"#,
            model.slug(),
            escape(model.title()),
            if model.can_create() {
                format!(r#"<a href="/admin/{}/new">Add</a>"#, model.slug())
            } else {
                String::new()
            }
        );
    }
    out.push_str("</tbody></table>");
    out
}

pub fn delete_confirmation(model: &dyn AdminModel, id: i64, label: &str) -> String {
    format!(
        r#"<p>Are you sure you want to delete the {} "{}"? Related records are deleted with it.</p>
<form method="post" action="/admin/{slug}/{id}/delete"><div class="actions"><button type="submit">Yes, I'm sure</button><a href="/admin/{slug}/{id}">No, take me back</a></div></form>"#,
        escape(model.singular()),
        escape(label),
        slug = model.slug(),
    )
}

pub fn login_form(email: &str, error: Option<&str>) -> String {
    let error = error
        .map(|e| format!(r#"<p class="errornote">{}</p>"#, escape(e)))
        .unwrap_or_default();
    format!(
        r#"{error}<form method="post" action="/admin/login">
<label for="email">Email</label><input type="email" id="email" name="email" value="{}">
<label for="password">Password</label><input type="password" id="password" name="password">
<div class="actions"><button type="submit">Log in</button></div>
</form>"#,
        escape(email)
    )
}
