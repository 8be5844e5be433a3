use crate::canon::CanonicalUrl;
use std::collections::HashSet;

/// Enumerate the host-suffix x path-prefix expressions probed for a URL.
/// At most 5 host suffixes and 6 path variants, so never more than 30
/// expressions. Duplicates are dropped, insertion order is preserved.
pub fn expressions(url: &CanonicalUrl) -> Vec<String> {
  let hosts = host_suffixes(&url.host);
  let paths = path_variants(&url.path, url.query.as_deref());

  let mut seen = HashSet::new();
  let mut out = Vec::with_capacity(hosts.len() * paths.len());
  for host in &hosts {
    for path in &paths {
      let expr = format!("{host}{path}");
      if seen.insert(expr.clone()) {
        out.push(expr);
      }
    }
  }
  out
}

/// The exact host, plus for non-IP hosts of three or more labels the last
/// N labels for N = 2..=5 (never the full host again, never more than the
/// last five).
fn host_suffixes(host: &str) -> Vec<String> {
  let mut out = vec![host.to_string()];
  if is_ipv4(host) {
    return out;
  }

  let labels: Vec<&str> = host.split('.').collect();
  if labels.len() < 3 {
    return out;
  }

  let max_n = 5.min(labels.len() - 1);
  for n in 2..=max_n {
    out.push(labels[labels.len() - n..].join("."));
  }
  out
}

/// The exact path with query, the exact path, and the directory prefixes
/// formed from the root and up to the first three directory components.
fn path_variants(path: &str, query: Option<&str>) -> Vec<String> {
  let mut out = Vec::with_capacity(6);
  if let Some(q) = query {
    out.push(format!("{path}?{q}"));
  }
  out.push(path.to_string());
  out.push("/".to_string());

  let dir_end = path.rfind('/').map_or(0, |i| i + 1);
  let components: Vec<&str> = path[..dir_end].split('/').filter(|s| !s.is_empty()).collect();

  let mut prefix = String::from("/");
  for component in components.iter().take(3) {
    prefix.push_str(component);
    prefix.push('/');
    out.push(prefix.clone());
  }
  out
}

fn is_ipv4(host: &str) -> bool {
  let parts: Vec<&str> = host.split('.').collect();
  parts.len() == 4
    && parts
      .iter()
      .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) && p.parse::<u32>().map_or(false, |v| v <= 255))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::canon::canonicalize;
  use std::collections::BTreeSet;

  fn exprs(url: &str) -> BTreeSet<String> {
    expressions(&canonicalize(url).unwrap()).into_iter().collect()
  }

  fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn host_and_path_cross_product() {
    assert_eq!(
      exprs("http://a.b.c/1/2.html?param=1"),
      set(&[
        "a.b.c/1/2.html?param=1",
        "a.b.c/1/2.html",
        "a.b.c/",
        "a.b.c/1/",
        "b.c/1/2.html?param=1",
        "b.c/1/2.html",
        "b.c/",
        "b.c/1/",
      ])
    );
  }

  #[test]
  fn ip_hosts_contribute_only_themselves() {
    assert_eq!(exprs("http://1.2.3.4/1/"), set(&["1.2.3.4/1/", "1.2.3.4/"]));
  }

  #[test]
  fn long_hosts_cap_at_last_five_labels() {
    assert_eq!(
      exprs("http://a.b.c.d.e.f.g/1.html"),
      set(&[
        "a.b.c.d.e.f.g/1.html",
        "a.b.c.d.e.f.g/",
        "c.d.e.f.g/1.html",
        "c.d.e.f.g/",
        "d.e.f.g/1.html",
        "d.e.f.g/",
        "e.f.g/1.html",
        "e.f.g/",
        "f.g/1.html",
        "f.g/",
      ])
    );
  }

  #[test]
  fn two_label_hosts_have_no_suffixes() {
    assert_eq!(
      exprs("http://b.c/a/b/c/d/e/f/g/h.html"),
      set(&[
        "b.c/a/b/c/d/e/f/g/h.html",
        "b.c/",
        "b.c/a/",
        "b.c/a/b/",
        "b.c/a/b/c/",
      ])
    );
  }

  #[test]
  fn never_more_than_thirty() {
    let e = expressions(&canonicalize("http://a.b.c.d.e.f.g/1/2/3/4/5/6.html?x=1").unwrap());
    assert!(e.len() <= 30);
    assert_eq!(e.len(), 30);
  }
}
