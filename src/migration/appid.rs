//! # App ID Authentication
//!
//! App ID protected services are fronted by the ALB OAuth-Proxy add-on in the
//! community controller. Every protected location needs an `auth-url`, an
//! `auth-signin` for browser flows, and a snippet that forwards the tokens
//! returned by the proxy to the application.
//!
//! The snippet is only added when the location does not already define any of
//! the variables it sets or the `Authorization` header.

use std::collections::BTreeMap;

use tracing::info;

use crate::annotations::parsers::{AppIdAuth, RequestType};

/// Instance name of the OAuth proxy: the binding secret without its `binding-` prefix
fn proxy_instance(bind_secret: &str) -> &str {
    bind_secret.strip_prefix("binding-").unwrap_or(bind_secret)
}

#[must_use]
pub fn auth_url(auth: &AppIdAuth) -> String {
    format!("https://$host/oauth2-{}/auth", proxy_instance(&auth.bind_secret))
}

/// Sign-in redirect, only for `requestType=web`
#[must_use]
pub fn signin_url(auth: &AppIdAuth) -> Option<String> {
    (auth.request_type == RequestType::Web).then(|| {
        format!(
            "https://$host/oauth2-{}/start?rd=$escaped_request_uri",
            proxy_instance(&auth.bind_secret)
        )
    })
}

/// Token forwarding snippet for one service
#[must_use]
pub fn auth_snippet(auth: &AppIdAuth) -> Vec<String> {
    let name = proxy_instance(&auth.bind_secret).replace('-', "_");
    let mut lines = vec![
        format!("auth_request_set $name_upstream_1 $upstream_cookie__oauth2_{name}_1;"),
        "auth_request_set $access_token $upstream_http_x_auth_request_access_token;".to_string(),
    ];
    if auth.id_token {
        lines.push("auth_request_set $id_token $upstream_http_authorization;".to_string());
    }
    lines.extend([
        "access_by_lua_block {".to_string(),
        "  if ngx.var.name_upstream_1 ~= \"\" then".to_string(),
        format!(
            "    ngx.header[\"Set-Cookie\"] = \"_oauth2_{name}_1=\" .. ngx.var.name_upstream_1 .. ngx.var.auth_cookie:match(\"(; .*)\")"
        ),
        "  end".to_string(),
    ]);
    if auth.id_token {
        lines.extend([
            "  if ngx.var.id_token ~= \"\" and ngx.var.access_token ~= \"\" then".to_string(),
            "    ngx.req.set_header(\"Authorization\", \"Bearer \" .. ngx.var.access_token .. \" \" .. ngx.var.id_token:match(\"%s*Bearer%s*(.*)\"))".to_string(),
        ]);
    } else {
        lines.extend([
            "  if ngx.var.access_token ~= \"\" then".to_string(),
            "    ngx.req.set_header(\"Authorization\", \"Bearer \" .. ngx.var.access_token)".to_string(),
        ]);
    }
    lines.extend(["  end".to_string(), "}".to_string()]);
    lines
}

fn has_word(line: &str, word: &str) -> bool {
    line.split_whitespace().any(|w| w == word)
}

/// Whether appending [`auth_snippet`] to `snippet` would redefine something it already sets
#[must_use]
pub fn conflicts(snippet: &[String]) -> bool {
    snippet.iter().any(|line| {
        let sets_auth_var = has_word(line, "auth_request_set")
            && ["$name_upstream_1", "$access_token", "$id_token"]
                .iter()
                .any(|var| has_word(line, var));
        sets_auth_var
            || line.contains("access_by_lua_block")
            || (has_word(line, "proxy_set_header") && has_word(line, "Authorization"))
    })
}

/// Append the auth snippet to every protected service's location snippet
///
/// Services whose existing snippet conflicts are left unchanged. Returns
/// whether any conflict was found.
pub fn inject_auth_snippets(
    snippets: &mut BTreeMap<String, Vec<String>>,
    protected: &BTreeMap<String, AppIdAuth>,
) -> bool {
    let mut conflict = false;
    for (service, auth) in protected {
        let snippet = snippets.entry(service.clone()).or_default();
        if !snippet.is_empty() && conflicts(snippet) {
            info!(
                "Location snippet of service {} already configures authentication, App ID snippet not added",
                service
            );
            conflict = true;
            continue;
        }
        snippet.extend(auth_snippet(auth));
    }
    conflict
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(request_type: RequestType, id_token: bool) -> AppIdAuth {
        AppIdAuth {
            bind_secret: "binding-my-appid".to_string(),
            namespace: "default".to_string(),
            request_type,
            id_token,
        }
    }

    #[test]
    fn test_urls_use_proxy_instance_name() {
        let web = auth(RequestType::Web, true);
        assert_eq!(auth_url(&web), "https://$host/oauth2-my-appid/auth");
        assert_eq!(
            signin_url(&web).as_deref(),
            Some("https://$host/oauth2-my-appid/start?rd=$escaped_request_uri")
        );
        assert_eq!(signin_url(&auth(RequestType::Api, true)), None);
    }

    #[test]
    fn test_snippet_variants() {
        let with_id = auth_snippet(&auth(RequestType::Api, true));
        assert_eq!(
            with_id[0],
            "auth_request_set $name_upstream_1 $upstream_cookie__oauth2_my_appid_1;"
        );
        assert_eq!(with_id.len(), 11);
        assert!(with_id.iter().any(|l| l.contains("$id_token")));

        let access_only = auth_snippet(&auth(RequestType::Api, false));
        assert_eq!(access_only.len(), 10);
        assert!(!access_only.iter().any(|l| l.contains("id_token")));
    }

    #[test]
    fn test_conflict_heuristic() {
        assert!(conflicts(&["proxy_set_header Authorization $token;".to_string()]));
        assert!(conflicts(&["access_by_lua_block {".to_string()]));
        assert!(conflicts(&["auth_request_set $access_token $x;".to_string()]));
        assert!(!conflicts(&["proxy_set_header X-Authorization yes;".to_string()]));
        assert!(!conflicts(&["rewrite_log on;".to_string()]));
    }

    #[test]
    fn test_injection_skips_conflicting_services() {
        let mut snippets = BTreeMap::from([
            ("tea-svc".to_string(), vec!["proxy_set_header Authorization x;".to_string()]),
            ("coffee-svc".to_string(), vec!["rewrite_log on;".to_string()]),
        ]);
        let protected = BTreeMap::from([
            ("tea-svc".to_string(), auth(RequestType::Api, true)),
            ("coffee-svc".to_string(), auth(RequestType::Api, false)),
        ]);

        assert!(inject_auth_snippets(&mut snippets, &protected));
        assert_eq!(snippets["tea-svc"].len(), 1);
        assert_eq!(snippets["coffee-svc"].len(), 11);
    }
}
