use anyhow::{Context, Result};
use handlebars::Handlebars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Index,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
        }
    }
}

pub fn new() -> Result<Handlebars<'static>> {
    let mut tt = Handlebars::new();
    tt.register_template_string(
        Template::Index.as_str(),
        include_str!("template/index.hbs"),
    )
    .context("could not compile the page template")?;

    Ok(tt)
}
