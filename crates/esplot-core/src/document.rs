//! Full-page plot documents.
//!
//! A producer that only has a bundled JS module wraps it into a page with a
//! single full-viewport canvas before submitting it.

use tera::{Context, Tera};

use crate::error::EsplotResult;

const PLOT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
	<meta charset="UTF-8">
	<meta name="viewport" content="width=device-width, initial-scale=1.0">
	<title>{{ title }}</title>
	<style>
	body {
		height: 100vh;
		overflow: hidden;
		contain: strict;
		display: grid;
		place-content: center;
		margin: 0px;
		padding: 0px;
	}
	canvas {
		width: 100%;
		height: 100%;
	}
	</style>
	<script type="module">{{ script | safe }}</script>
</head>
<body>
<canvas></canvas>
</body>
</html>
"#;

pub const DEFAULT_TITLE: &str = "ESPlot";

/// Render `script` (an ES module) into a plot page. The title is escaped,
/// the script is inlined verbatim.
pub fn render_plot_document(script: &str, title: &str) -> EsplotResult<String> {
    let mut context = Context::new();
    context.insert("title", title);
    context.insert("script", script);
    Ok(Tera::one_off(PLOT_TEMPLATE, &context, true)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_inlined_verbatim() {
        let script = "const c = document.querySelector('canvas'); if (1 < 2 && c) {}";
        let page = render_plot_document(script, DEFAULT_TITLE).unwrap();
        assert!(page.contains(script));
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<canvas></canvas>"));
    }

    #[test]
    fn test_title_is_escaped() {
        let page = render_plot_document("", "a <b> plot").unwrap();
        assert!(page.contains("<title>a &lt;b&gt; plot</title>"));
    }
}
