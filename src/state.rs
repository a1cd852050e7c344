use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use handlebars::Handlebars;

use crate::config::Config;
use crate::template;

#[derive(Clone)]
pub struct State {
    pub cfg: Arc<Config>,
    pub feed_path: Arc<PathBuf>,
    pub template: Arc<Handlebars<'static>>,
}

impl State {
    pub fn new(cfg: Config) -> Result<Self> {
        let feed_path = Arc::new(cfg.output.clone());
        let template = Arc::new(template::new()?);

        Ok(State {
            cfg: Arc::new(cfg),
            feed_path,
            template,
        })
    }
}
