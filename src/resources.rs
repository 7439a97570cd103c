//! Static documents served over `resources/list` and `resources/read`.

use rmcp::model::{RawResource, Resource, ResourceContents};

const MIME_TYPE: &str = "text/plain";

/// A read-only text document compiled into the binary
#[derive(Debug, Clone, Copy)]
pub struct StaticResource {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub text: &'static str,
}

pub const CONNECTION_HELP: StaticResource = StaticResource {
    uri: "anki://connection-help",
    name: "connection-help",
    description: "Help for connecting to AnkiConnect",
    text: include_str!("./resources/connection-help.txt"),
};

pub const ABOUT: StaticResource = StaticResource {
    uri: "anki://about",
    name: "about",
    description: "About the AnkiConnect MCP Server",
    text: include_str!("./resources/about.txt"),
};

pub const CATALOG: &[StaticResource] = &[CONNECTION_HELP, ABOUT];

pub fn find(uri: &str) -> Option<&'static StaticResource> {
    CATALOG.iter().find(|resource| resource.uri == uri)
}

impl StaticResource {
    pub fn descriptor(&self) -> Resource {
        Resource {
            raw: RawResource {
                uri: self.uri.into(),
                name: self.name.into(),
                description: Some(self.description.into()),
                mime_type: Some(MIME_TYPE.into()),
                size: u32::try_from(self.text.len()).ok(),
            },
            annotations: None,
        }
    }

    pub fn contents(&self) -> ResourceContents {
        ResourceContents::TextResourceContents {
            uri: self.uri.into(),
            mime_type: Some(MIME_TYPE.into()),
            text: self.text.into(),
        }
    }
}
