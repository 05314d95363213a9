//! Resolving user input to discovered kinds and tree positions.

use anyhow::{anyhow, bail, Result};

use driftscope_core::CrdInfo;

/// Find a kind by CRD name (`plural.group`), plural, or kind. Kind matches
/// are case-insensitive and must be unambiguous.
pub fn resolve_crd<'a>(crds: &'a [CrdInfo], wanted: &str) -> Result<&'a CrdInfo> {
    if let Some(c) = crds.iter().find(|c| c.name == wanted) {
        return Ok(c);
    }
    let hits: Vec<&CrdInfo> = crds
        .iter()
        .filter(|c| c.kind.eq_ignore_ascii_case(wanted) || c.plural.eq_ignore_ascii_case(wanted))
        .collect();
    match hits.as_slice() {
        [one] => Ok(one),
        [] => Err(anyhow!("no custom resource kind matches {:?}", wanted)),
        many => {
            let names: Vec<&str> = many.iter().map(|c| c.name.as_str()).collect();
            bail!("{:?} is ambiguous; use one of: {}", wanted, names.join(", "))
        }
    }
}

/// Split `spec.rules[0].host` into tree node names: `spec`, `rules`, `[0]`,
/// `host`. Empty `[]` markers are dropped since schema trees already fold
/// array items into their parent.
pub fn field_path_segments(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    for part in path.split('.').filter(|p| !p.is_empty()) {
        let (head, mut rest) = match part.find('[') {
            Some(i) => (&part[..i], &part[i..]),
            None => (part, ""),
        };
        if !head.is_empty() {
            out.push(head.to_string());
        }
        while let Some(end) = rest.find(']') {
            let idx = &rest[..=end];
            if idx != "[]" {
                out.push(idx.to_string());
            }
            rest = &rest[end + 1..];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crd(kind: &str, group: &str) -> CrdInfo {
        CrdInfo {
            name: format!("{}s.{}", kind.to_lowercase(), group),
            group: group.to_string(),
            version: "v1".to_string(),
            kind: kind.to_string(),
            plural: format!("{}s", kind.to_lowercase()),
            namespaced: true,
        }
    }

    #[test]
    fn resolves_by_name_kind_or_plural() {
        let crds = vec![crd("Certificate", "cert-manager.io"), crd("Issuer", "cert-manager.io")];
        assert_eq!(resolve_crd(&crds, "certificates.cert-manager.io").expect("name").kind, "Certificate");
        assert_eq!(resolve_crd(&crds, "issuer").expect("kind").kind, "Issuer");
        assert_eq!(resolve_crd(&crds, "issuers").expect("plural").kind, "Issuer");
        assert!(resolve_crd(&crds, "Widget").is_err());
    }

    #[test]
    fn ambiguous_kind_lists_candidates() {
        let crds = vec![crd("Cluster", "a.io"), crd("Cluster", "b.io")];
        let err = resolve_crd(&crds, "cluster").expect_err("ambiguous").to_string();
        assert!(err.contains("clusters.a.io") && err.contains("clusters.b.io"));
        assert!(resolve_crd(&crds, "clusters.b.io").is_ok());
    }

    #[test]
    fn path_segments() {
        assert_eq!(field_path_segments("spec.rules[0].host"), vec!["spec", "rules", "[0]", "host"]);
        assert_eq!(field_path_segments("spec.rules[].host"), vec!["spec", "rules", "host"]);
        assert_eq!(field_path_segments("m[1][2]"), vec!["m", "[1]", "[2]"]);
        assert!(field_path_segments("").is_empty());
    }
}
