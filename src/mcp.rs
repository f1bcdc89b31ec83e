//! MCP server exposing the message bridge over stdio.
//! Launch: `message-bridge mcp-server --stdio`
//!
//! Tool parameters must be wrapped in `Parameters<T>` for `#[tool_router]`
//! to accept them; plain `Deserialize + JsonSchema` structs do not route.

use std::sync::Arc;

use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer,
};
use serde::Serialize;

use crate::bridge::{MessageBridge, DEFAULT_HOURS};

pub const SERVER_NAME: &str = "MessageBridge";

const RESOURCE_SCHEME: &str = "messages://";
const RECENT_TEMPLATE: &str = "messages://recent/{hours}";
const CONTACT_TEMPLATE: &str = "messages://contact/{contact}/{hours}";

// ─── Parameter Structs ───────────────────────────────────────────────────────

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct RecentMessagesParams {
    /// Number of hours to look back (default: 24)
    hours: Option<u32>,
    /// Contact name, phone number, email, or `contact:N` to pick from the last match list
    contact: Option<String>,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct SendMessageParams {
    /// Phone number, email, contact name, or `contact:N`
    recipient: String,
    /// Message text to send
    message: String,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct FindContactParams {
    /// Name to search for; fuzzy matched against the address book
    name: String,
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
struct CheckParams {}

#[derive(Serialize)]
struct FoundContacts<'a> {
    query: &'a str,
    matches: Vec<crate::resolver::MatchCandidate>,
}

// ─── Resources ───────────────────────────────────────────────────────────────

/// A readable `messages://` resource.
#[derive(Debug, PartialEq)]
enum MessagesResource {
    Recent { hours: u32 },
    Contact { contact: String, hours: u32 },
}

impl MessagesResource {
    /// `messages://recent/{hours}` or `messages://contact/{contact}/{hours}`;
    /// the hours segment may be left out. The contact is percent-decoded.
    fn parse(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(RESOURCE_SCHEME)?;
        let parts: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        let hours = |raw: Option<&&str>| match raw {
            Some(h) => h.parse::<u32>().ok(),
            None => Some(DEFAULT_HOURS),
        };
        match parts.as_slice() {
            ["recent"] | ["recent", _] => Some(Self::Recent {
                hours: hours(parts.get(1))?,
            }),
            ["contact", contact] | ["contact", contact, _] => {
                let contact = urlencoding::decode(contact).ok()?.trim().to_string();
                if contact.is_empty() {
                    return None;
                }
                Some(Self::Contact {
                    contact,
                    hours: hours(parts.get(2))?,
                })
            }
            _ => None,
        }
    }
}

fn resource_templates() -> Vec<ResourceTemplate> {
    [
        (RECENT_TEMPLATE, "recent-messages", "Messages from the last {hours} hours"),
        (
            CONTACT_TEMPLATE,
            "contact-messages",
            "Messages exchanged with a contact (name, number, email or contact:N) in the last {hours} hours",
        ),
    ]
    .into_iter()
    .map(|(uri_template, name, description)| {
        RawResourceTemplate {
            uri_template: uri_template.to_string(),
            name: name.to_string(),
            title: None,
            description: Some(description.to_string()),
            mime_type: Some("text/plain".to_string()),
            icons: None,
        }
        .no_annotation()
    })
    .collect()
}

// ─── Tools ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Tools {
    tool_router: ToolRouter<Self>,
    bridge: Arc<MessageBridge>,
}

impl Tools {
    fn tool_error(msg: impl Into<String>) -> CallToolResult {
        let mut result = CallToolResult::success(vec![Content::text(msg.into())]);
        result.is_error = Some(true);
        result
    }

    fn tool_text(text: String) -> CallToolResult {
        CallToolResult::success(vec![Content::text(text)])
    }

    fn tool_ok(value: &impl Serialize) -> CallToolResult {
        let json = serde_json::to_string_pretty(value).unwrap_or_default();
        CallToolResult::success(vec![Content::text(json)])
    }
}

#[tool_router]
impl Tools {
    fn new(bridge: Arc<MessageBridge>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            bridge,
        }
    }

    #[tool(description = "Get recent messages from the Messages app, optionally filtered by contact.")]
    async fn tool_get_recent_messages(
        &self,
        Parameters(p): Parameters<RecentMessagesParams>,
    ) -> Result<CallToolResult, McpError> {
        let hours = p.hours.unwrap_or(DEFAULT_HOURS);
        let text = self.bridge.get_recent_messages(hours, p.contact.as_deref());
        if text.starts_with("Error accessing messages:") {
            return Ok(Self::tool_error(text));
        }
        Ok(Self::tool_text(text))
    }

    #[tool(description = "Send a message using the Messages app. The recipient may be a phone number, \
        email, contact name, or `contact:N` after an ambiguous match.")]
    async fn tool_send_message(
        &self,
        Parameters(p): Parameters<SendMessageParams>,
    ) -> Result<CallToolResult, McpError> {
        let text = self.bridge.send_message(&p.recipient, &p.message);
        if text.starts_with("Error sending message:") {
            return Ok(Self::tool_error(text));
        }
        Ok(Self::tool_text(text))
    }

    #[tool(description = "Find address-book contacts by name. Returns ranked matches with scores.")]
    async fn tool_find_contact(
        &self,
        Parameters(p): Parameters<FindContactParams>,
    ) -> Result<CallToolResult, McpError> {
        let matches = self.bridge.find_contact(&p.name);
        if matches.is_empty() {
            return Ok(Self::tool_text(format!("No contacts found matching '{}'.", p.name)));
        }
        Ok(Self::tool_ok(&FoundContacts {
            query: &p.name,
            matches,
        }))
    }

    #[tool(description = "Diagnose access to the Messages database.")]
    async fn tool_check_db_access(
        &self,
        Parameters(_p): Parameters<CheckParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(Self::tool_text(self.bridge.check_db_access()))
    }

    #[tool(description = "Diagnose access to the AddressBook databases.")]
    async fn tool_check_addressbook_access(
        &self,
        Parameters(_p): Parameters<CheckParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(Self::tool_text(self.bridge.check_addressbook_access()))
    }

    #[tool(description = "List available contacts in the address book.")]
    async fn tool_check_contacts(
        &self,
        Parameters(_p): Parameters<CheckParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(Self::tool_text(self.bridge.check_contacts()))
    }
}

#[tool_handler]
impl ServerHandler for Tools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Read and send iMessages. When a name matches several contacts, \
                 repeat the call with `contact:N` to pick one."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: resource_templates(),
            ..Default::default()
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = match MessagesResource::parse(&request.uri) {
            Some(MessagesResource::Recent { hours }) => self.bridge.get_recent_messages(hours, None),
            Some(MessagesResource::Contact { contact, hours }) => {
                self.bridge.get_recent_messages(hours, Some(&contact))
            }
            None => {
                return Err(McpError::resource_not_found(
                    format!("unknown resource: {}", request.uri),
                    None,
                ))
            }
        };
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::TextResourceContents {
                uri: request.uri,
                mime_type: Some("text/plain".to_string()),
                text,
                meta: None,
            }],
        })
    }
}

pub async fn run_mcp_server(bridge: Arc<MessageBridge>) -> Result<(), String> {
    let service = Tools::new(bridge)
        .serve(stdio())
        .await
        .map_err(|e| format!("MCP server error: {}", e))?;
    service
        .waiting()
        .await
        .map_err(|e| format!("MCP server terminated: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recent_resource() {
        assert_eq!(
            MessagesResource::parse("messages://recent/48"),
            Some(MessagesResource::Recent { hours: 48 })
        );
        assert_eq!(
            MessagesResource::parse("messages://recent"),
            Some(MessagesResource::Recent { hours: DEFAULT_HOURS })
        );
        assert_eq!(MessagesResource::parse("messages://recent/soon"), None);
        assert_eq!(MessagesResource::parse("messages://recent/-1"), None);
    }

    #[test]
    fn test_parse_contact_resource() {
        assert_eq!(
            MessagesResource::parse("messages://contact/John%20Smith/12"),
            Some(MessagesResource::Contact {
                contact: "John Smith".to_string(),
                hours: 12
            })
        );
        assert_eq!(
            MessagesResource::parse("messages://contact/contact:2"),
            Some(MessagesResource::Contact {
                contact: "contact:2".to_string(),
                hours: DEFAULT_HOURS
            })
        );
        assert_eq!(
            MessagesResource::parse("messages://contact/%2B13105551234/1"),
            Some(MessagesResource::Contact {
                contact: "+13105551234".to_string(),
                hours: 1
            })
        );
    }

    #[test]
    fn test_parse_rejects_other_uris() {
        for uri in [
            "messages://contact//24",
            "messages://contact/a/b/c",
            "messages://unread/24",
            "file:///tmp/chat.db",
            "",
        ] {
            assert_eq!(MessagesResource::parse(uri), None, "{uri}");
        }
    }

    #[test]
    fn test_templates_match_parser() {
        let templates = resource_templates();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].uri_template, RECENT_TEMPLATE);
        assert_eq!(templates[1].uri_template, CONTACT_TEMPLATE);
        assert!(MessagesResource::parse(&RECENT_TEMPLATE.replace("{hours}", "6")).is_some());
        assert!(MessagesResource::parse(
            &CONTACT_TEMPLATE.replace("{contact}", "Alice").replace("{hours}", "6")
        )
        .is_some());
    }
}
