//! Minimal `{{ .Var }}` URL template rendering.

use anyhow::{Result, anyhow, bail};

/// Render `template`, replacing each `{{ .Name }}` placeholder with its value
/// from `vars`. Whitespace inside the braces is optional.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| anyhow!("unterminated placeholder in template '{}'", template))?;

        let expr = after[..end].trim();
        let Some(var) = expr.strip_prefix('.') else {
            bail!("invalid placeholder '{{{{{}}}}}' in template '{}'", expr, template);
        };

        let value = vars
            .iter()
            .find(|(name, _)| *name == var)
            .map(|(_, value)| *value)
            .ok_or_else(|| anyhow!("unknown template variable '{}' in '{}'", var, template))?;

        out.push_str(value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}
