use std::borrow::Cow;
use url::Url;

/// canonical form of a relay address: websocket scheme, lowercase host, no trailing slash.
///
/// http(s) is mapped to ws(s) and a missing scheme means wss, or ws for local hosts.
pub fn normalize_url(input: &str) -> Result<Url, url::ParseError> {
    let input = input.trim();
    let with_scheme = if input.contains("://") {
        Cow::Borrowed(input)
    } else if is_local(input) {
        Cow::Owned(format!("ws://{}", input))
    } else {
        Cow::Owned(format!("wss://{}", input))
    };

    // special schemes get their host lowercased while parsing
    let mut url = Url::parse(&with_scheme)?;
    let websocket_scheme = match url.scheme() {
        "https" => Some("wss"),
        "http" => Some("ws"),
        _ => None,
    };
    if let Some(scheme) = websocket_scheme {
        let _ = url.set_scheme(scheme);
    }

    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&path);

    Ok(url)
}

fn is_local(host: &str) -> bool {
    host.starts_with("localhost") || host.starts_with("127.0.0.1") || host.contains(".localhost")
}

/// relays are supposed to start OK/CLOSED reasons with a `word: ` prefix, add one when they don't
pub fn normalize_ok_message(reason: &str, prefix: &str) -> String {
    match reason.split_once(": ") {
        Some((machine, _)) if !machine.is_empty() && !machine.contains(' ') => reason.to_string(),
        _ => format!("{}: {}", prefix, reason),
    }
}
