use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

use crate::asset::{Asset, Assets, Meta};
use crate::filter::{self, Filter};

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// First present key wins, in this order.
const LASTMOD_KEYS: &[&str] = &["SitemapLastModified", "LastModified", "Date"];
const PRIORITY_KEYS: &[&str] = &["SitemapPriority", "Priority"];
const CHANGEFREQ_KEYS: &[&str] = &["SitemapChangeFreq", "ChangeFreq"];

/// Characters percent-encoded inside a sitemap `<loc>` path.
const LOC_ESCAPE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>').add(b'`');

impl Assets {
    /// Append a `/sitemap.xml` asset listing the collection.
    ///
    /// Assets with a truthy `SitemapExclude` metadata value are always
    /// left out, as is anything failing the caller's extra filters.
    /// A no-op on an empty collection.
    pub fn add_sitemap(&mut self, base_url: &str, filters: Vec<Filter>) {
        if self.is_empty() {
            return;
        }

        let mut selectors: Vec<Filter> = vec![filter::without_meta("SitemapExclude")];
        selectors.extend(filters);
        let entries = self.filter(&selectors);

        let mut xml = String::with_capacity(256 + 96 * entries.len());
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push_str(&format!(r#"<urlset xmlns="{}">"#, SITEMAP_NS));

        let base = base_url.trim_end_matches('/');
        for asset in entries.iter() {
            let location = format!("{}{}", base, utf8_percent_encode(&asset.path, LOC_ESCAPE));

            xml.push_str("<url><loc>");
            xml.push_str(&html_escape::encode_text(&location));
            xml.push_str("</loc>");

            if let Some(meta) = &asset.meta {
                if let Some(lastmod) = first_string(meta, LASTMOD_KEYS) {
                    xml.push_str("<lastmod>");
                    xml.push_str(&html_escape::encode_text(lastmod));
                    xml.push_str("</lastmod>");
                }
                if let Some(priority) = priority_of(meta) {
                    xml.push_str("<priority>");
                    xml.push_str(&html_escape::encode_text(&priority));
                    xml.push_str("</priority>");
                }
                if let Some(changefreq) = first_string(meta, CHANGEFREQ_KEYS) {
                    xml.push_str("<changefreq>");
                    xml.push_str(&html_escape::encode_text(changefreq));
                    xml.push_str("</changefreq>");
                }
            }

            xml.push_str("</url>");
        }

        xml.push_str("</urlset>");

        let mut meta = Meta::new();
        meta.insert(
            "ContentType".to_string(),
            Value::from("application/xml"),
        );
        self.add(Asset {
            path: "/sitemap.xml".to_string(),
            data: xml.into_bytes(),
            meta: Some(meta),
        });
    }

    /// Append a `/robots.txt` asset: a disallow-all header followed by
    /// the caller's literal lines. A no-op on an empty collection.
    pub fn add_robots_txt<S: AsRef<str>>(&mut self, lines: &[S]) {
        if self.is_empty() {
            return;
        }

        let mut data = String::from("User-agent: *\nDisallow: /\n");
        for line in lines {
            data.push_str(line.as_ref());
            data.push('\n');
        }

        let mut meta = Meta::new();
        meta.insert("ContentType".to_string(), Value::from("text/plain"));
        self.add(Asset {
            path: "/robots.txt".to_string(),
            data: data.into_bytes(),
            meta: Some(meta),
        });
    }
}

fn first_string<'a>(meta: &'a Meta, keys: &[&str]) -> Option<&'a str> {
    for key in keys {
        if let Some(Value::String(value)) = meta.get(*key) {
            return Some(value);
        }
    }
    None
}

/// Priority from the first recognized key: numbers render with exactly
/// one decimal place, strings pass through verbatim.
fn priority_of(meta: &Meta) -> Option<String> {
    for key in PRIORITY_KEYS {
        match meta.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(f) = n.as_f64() {
                    return Some(format!("{:.1}", f));
                }
            }
            Some(Value::String(s)) => return Some(s.clone()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::with_path;

    fn asset(path: &str) -> Asset {
        Asset::new(path, "")
    }

    fn meta_asset(path: &str, entries: &[(&str, Value)]) -> Asset {
        let mut meta = Meta::new();
        for (k, v) in entries {
            meta.insert(k.to_string(), v.clone());
        }
        Asset {
            path: path.to_string(),
            data: Vec::new(),
            meta: Some(meta),
        }
    }

    fn sitemap_of(assets: &Assets) -> String {
        let found = assets.filter(&[with_path("/sitemap.xml")]);
        String::from_utf8(found[0].data.clone()).unwrap()
    }

    #[test]
    fn lists_assets_in_collection_order() {
        let mut assets = Assets::new();
        assets.add(asset("/index.html"));
        assets.add(asset("/about.html"));
        assets.add(asset("/contact.html"));
        assets.add(asset("/styles.css"));

        assets.add_sitemap("https://test.com", vec![]);

        assert_eq!(
            sitemap_of(&assets),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
                "<url><loc>https://test.com/index.html</loc></url>",
                "<url><loc>https://test.com/about.html</loc></url>",
                "<url><loc>https://test.com/contact.html</loc></url>",
                "<url><loc>https://test.com/styles.css</loc></url>",
                "</urlset>",
            )
        );

        let sitemap = &assets.filter(&[with_path("/sitemap.xml")])[0];
        assert_eq!(
            sitemap.meta.as_ref().and_then(|m| m.get("ContentType")),
            Some(&Value::from("application/xml"))
        );
    }

    #[test]
    fn renders_optional_fields_and_exclusions() {
        let mut assets = Assets::new();
        assets.add(meta_asset(
            "/index.html",
            &[("SitemapPriority", Value::from(1.0))],
        ));
        assets.add(meta_asset(
            "/important.html",
            &[("SitemapPriority", Value::from("0.8"))],
        ));
        assets.add(meta_asset(
            "/about.html",
            &[("LastModified", Value::from("2025-08-02"))],
        ));
        assets.add(meta_asset(
            "/contact.html",
            &[("SitemapExclude", Value::from(false))],
        ));
        assets.add(meta_asset(
            "/private.html",
            &[("SitemapExclude", Value::from(true))],
        ));
        assets.add(meta_asset(
            "/styles.css",
            &[("SitemapChangeFreq", Value::from("never"))],
        ));

        assets.add_sitemap("https://test.com", vec![]);

        assert_eq!(
            sitemap_of(&assets),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
                "<url><loc>https://test.com/index.html</loc><priority>1.0</priority></url>",
                "<url><loc>https://test.com/important.html</loc><priority>0.8</priority></url>",
                "<url><loc>https://test.com/about.html</loc><lastmod>2025-08-02</lastmod></url>",
                "<url><loc>https://test.com/contact.html</loc></url>",
                "<url><loc>https://test.com/styles.css</loc><changefreq>never</changefreq></url>",
                "</urlset>",
            )
        );
    }

    #[test]
    fn respects_caller_filters() {
        let mut assets = Assets::new();
        assets.add(asset("/index.html"));
        assets.add(asset("/styles.css"));

        assets.add_sitemap(
            "https://test.com",
            vec![crate::filter::with_extensions([".html"])],
        );

        let xml = sitemap_of(&assets);
        assert!(xml.contains("/index.html"));
        assert!(!xml.contains("/styles.css"));
    }

    #[test]
    fn escapes_locations() {
        let mut assets = Assets::new();
        assets.add(asset("/a page & more.html"));

        assets.add_sitemap("https://test.com", vec![]);

        let xml = sitemap_of(&assets);
        assert!(xml.contains("<loc>https://test.com/a%20page%20&amp;%20more.html</loc>"));
    }

    #[test]
    fn no_ops_on_an_empty_collection() {
        let mut assets = Assets::new();
        assets.add_sitemap("https://test.com", vec![]);
        assert!(assets.is_empty());

        assets.add_robots_txt::<&str>(&[]);
        assert!(assets.is_empty());
    }

    #[test]
    fn robots_txt_appends_literal_lines() {
        let mut assets = Assets::new();
        assets.add(asset("/index.html"));

        assets.add_robots_txt(&[
            "Allow: /",
            "Sitemap: https://example.com/sitemap.xml",
        ]);

        let robots = &assets.filter(&[with_path("/robots.txt")])[0];
        assert_eq!(
            String::from_utf8(robots.data.clone()).unwrap(),
            "User-agent: *\nDisallow: /\nAllow: /\nSitemap: https://example.com/sitemap.xml\n"
        );
        assert_eq!(
            robots.meta.as_ref().and_then(|m| m.get("ContentType")),
            Some(&Value::from("text/plain"))
        );
    }
}
