//! Source template expansion.
//!
//! Substitutes `{token}` and `{token=default}` fields in a source template's
//! config with values taken from the camera and the client context. A template
//! that cannot be fully expanded, or that is restricted to other networks,
//! simply does not apply: expansion yields `None` rather than an error.

use super::{BackendKind, StreamDescriptor};
use crate::catalog::{Camera, ClientContext, SourceTemplate};

/// Fixed size code handed to sources that scale their output.
const SIZE_CODE: &str = "s";

/// Client property holding the operator's district.
const DISTRICT_PROPERTY: &str = "district";

/// Expands source templates into stream descriptors.
pub struct TemplateExpander;

impl TemplateExpander {
    /// Expands one template for a camera in the given client context.
    ///
    /// Returns `None` when the template is ineligible: the client is on a
    /// network outside the template's subnet list, a field without a default
    /// cannot be resolved, or the result is neither a pipeline nor a URL (or is
    /// a pipeline on a client without a pipeline runtime).
    pub fn expand(
        template: &SourceTemplate,
        camera: &Camera,
        context: &ClientContext,
    ) -> Option<StreamDescriptor> {
        let subnets = template.subnets.as_deref().unwrap_or("");
        if !is_member(subnets, &context.network_name) {
            tracing::trace!(
                "Template {} not available on network {}",
                template.name,
                context.network_name
            );
            return None;
        }

        let Some(config) = substitute(&template.config, |token| {
            resolve_token(token, template, camera, context)
        }) else {
            tracing::trace!(
                "Template {} has unresolved fields for camera {}",
                template.name,
                camera.name
            );
            return None;
        };

        let descriptor = StreamDescriptor::new(template.label.clone(), config)?;
        if descriptor.backend_kind() == BackendKind::Pipeline && !context.pipeline_available {
            tracing::trace!("Template {} needs a pipeline runtime", template.name);
            return None;
        }
        Some(descriptor)
    }
}

/// Returns true when `item` appears in a comma or semicolon separated list.
///
/// Matching ignores case and surrounding whitespace; an empty list matches
/// everything.
pub fn is_member(list: &str, item: &str) -> bool {
    if list.trim().is_empty() {
        return true;
    }
    list.split([',', ';'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| entry.eq_ignore_ascii_case(item.trim()))
}

/// Makes a camera name safe for use as a path segment of a playback URI.
///
/// ASCII letters, digits and `.-_~` are kept; everything else becomes `_`.
pub fn sanitize_path_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_' | '~') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Replaces every `{token}` / `{token=default}` field in `config`.
///
/// `lookup` receives the token name; fields it cannot resolve fall back to
/// their inline default. Returns `None` if any field stays unresolved. Text
/// without a closing brace, and empty `{}` pairs, are copied literally.
pub(crate) fn substitute<F>(config: &str, mut lookup: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(config.len());
    let mut rest = config;

    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            break;
        };
        if close == 0 {
            out.push_str(&rest[..open + 2]);
            rest = &after_open[1..];
            continue;
        }

        out.push_str(&rest[..open]);
        let field = &after_open[..close];
        let (token, default) = match field.split_once('=') {
            Some((token, default)) => (token, Some(default)),
            None => (field, None),
        };

        let value = lookup(token)
            .filter(|value| !value.is_empty())
            .or_else(|| default.map(str::to_string))?;
        out.push_str(&value);
        rest = &after_open[close + 1..];
    }

    out.push_str(rest);
    Some(out)
}

fn resolve_token(
    token: &str,
    template: &SourceTemplate,
    camera: &Camera,
    context: &ClientContext,
) -> Option<String> {
    let default_port = template.default_port;
    let address = camera
        .encoder_address
        .as_deref()
        .filter(|address| !address.is_empty());

    match token.to_ascii_lowercase().as_str() {
        "addr" => address.map(str::to_string),
        "port" => camera.encoder_port.or(default_port).map(|port| port.to_string()),
        "addrport" => address.map(|address| {
            join_addr_port(address, camera.encoder_port.or(default_port))
        }),
        "maddr" => split_addr_port(camera.encoder_multicast.as_deref()?).map(|(host, _)| host),
        "mport" => {
            let (_, port) = split_addr_port(camera.encoder_multicast.as_deref()?)?;
            port.or(default_port).map(|port| port.to_string())
        }
        "maddrport" => {
            let (host, port) = split_addr_port(camera.encoder_multicast.as_deref()?)?;
            Some(join_addr_port(&host, port.or(default_port)))
        }
        "chan" => camera.encoder_channel.map(|channel| channel.to_string()),
        "name" => Some(camera.name.clone()),
        "dist" => context.property(DISTRICT_PROPERTY).map(str::to_string),
        "session-id" => Some(context.session_id.to_string()),
        "pname" => Some(sanitize_path_name(&camera.name)),
        "sizecode" => Some(SIZE_CODE.to_string()),
        "user" => credentials(camera).map(|(user, _)| user.to_string()),
        "password" => credentials(camera).and_then(|(_, password)| password.map(str::to_string)),
        _ => context.property(token).map(str::to_string),
    }
}

fn credentials(camera: &Camera) -> Option<(&str, Option<&str>)> {
    let credentials = camera.controller_credentials.as_deref()?;
    Some(match credentials.split_once(':') {
        Some((user, password)) => (user, Some(password)),
        None => (credentials, None),
    })
}

fn join_addr_port(address: &str, port: Option<u16>) -> String {
    match port {
        Some(port) => format!("{address}:{port}"),
        None => address.to_string(),
    }
}

/// Splits an `addr[:port]` string into host and optional port.
fn split_addr_port(value: &str) -> Option<(String, Option<u16>)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    // A scheme without a default port keeps an explicit `:80` visible
    let url = url::Url::parse(&format!("addr://{value}")).ok()?;
    let host = url.host_str().filter(|host| !host.is_empty())?;
    Some((host.to_string(), url.port()))
}
