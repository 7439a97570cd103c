use crate::{Config, Result};

pub mod anki_connect;

pub struct Providers {
    pub anki: anki_connect::AnkiConnectProvider,
}

impl Providers {
    pub fn new(config: &Config) -> Result<Self> {
        let anki = anki_connect::AnkiConnectProvider::new(config)?;
        Ok(Self { anki })
    }
}
