use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgMatches, Command};

use sift_core::{
    filter, Asset, Assets, AutoReloadTransformer, EncryptionTransformer, FrontmatterTransformer,
    Layout, MarkdownTransformer, Meta, Minifier, MinifyTransformer, StorageMode,
    TemplateTransformer,
};

use crate::config::{password_from, SiftConfig};

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source directory to collect assets from")
                .default_value("./site"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for the generated site")
                .default_value("./out"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value("./sift.toml"),
        )
        .arg(
            Arg::new("git")
                .long("git")
                .value_name("URL")
                .help("Collect from a remote git repository instead of a directory"),
        )
        .arg(
            Arg::new("branch")
                .long("branch")
                .value_name("BRANCH")
                .help("Branch to clone when collecting from git"),
        )
        .arg(
            Arg::new("git-prefix")
                .long("git-prefix")
                .value_name("DIR")
                .help("Leading virtual path segment for git-collected assets"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .value_name("URL")
                .help("Absolute base URL for sitemap locations"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("Password for protected assets (or SIFT_PASSWORD)"),
        )
        .arg(
            Arg::new("minify")
                .long("minify")
                .help("Minify HTML, CSS, JS, SVG and XML output")
                .action(clap::ArgAction::SetTrue),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the site from collected assets")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = SiftConfig::load(args)?;
    let password = password_from(args);

    build_site(&config, password.as_deref(), false)?;

    println!("Site built successfully in {}", config.build.output);

    Ok(())
}

/// The whole pipeline: collect, divert components and layout, run the
/// transform chain, encrypt protected assets, generate sitemap and
/// robots.txt, write out.
pub fn build_site(config: &SiftConfig, password: Option<&str>, dev_mode: bool) -> Result<()> {
    let build = &config.build;
    let pipeline = &config.pipeline;

    // COLLECT
    let mut assets = match &build.git {
        Some(url) => {
            println!("Cloning {} ({})", url, build.branch);
            Assets::from_git(url, &build.branch, &build.git_prefix)?
        }
        None => Assets::from_dir(Path::new(&build.source))?,
    };
    println!("Collected {} assets", assets.len());

    // Components and the layout leave the main flow before any
    // transformer runs; they are inputs to templating, not pages.
    let components = collect_components(&mut assets, &pipeline.site.components_dir);
    let layout = pop_layout(&mut assets, pipeline)?;

    // TRANSFORM
    assets.transform(&[&FrontmatterTransformer, &MarkdownTransformer::default()])?;

    let mut global = Meta::new();
    for (key, value) in &pipeline.site.global {
        global.insert(key.clone(), value.clone());
    }
    let templating = TemplateTransformer {
        components,
        global,
        layout,
    };
    let mut pages = assets.pop(&[filter::with_extensions([".html"])]);
    pages.transform(&[&templating])?;
    assets.append(pages);

    encrypt_protected(&mut assets, pipeline, password)?;

    if pipeline.minify.enable {
        let minify = MinifyTransformer::new(Minifier::new());
        assets.transform(&[&minify])?;
    }

    if dev_mode {
        let reload = AutoReloadTransformer {
            ws_path: pipeline.reload.ws_path.clone(),
            timeout_ms: pipeline.reload.timeout_ms,
        };
        assets.transform(&[&reload])?;
    }

    // GENERATE
    if pipeline.sitemap.enable {
        if let Some(base_url) = &pipeline.site.base_url {
            assets.add_sitemap(base_url, vec![]);
        }
    }
    if pipeline.robots.enable {
        assets.add_robots_txt(&pipeline.robots.lines);
    }

    // WRITE
    assets.write(Path::new(&build.output))?;
    println!("Wrote {} assets to {}", assets.len(), build.output);

    Ok(())
}

/// Pop everything under the components dir and name each piece by its
/// file stem ("/components/nav.html" becomes "nav").
fn collect_components(assets: &mut Assets, components_dir: &str) -> HashMap<String, Asset> {
    let mut components = HashMap::new();
    for asset in assets.pop(&[filter::with_parent_dir(components_dir)]) {
        components.insert(component_name(&asset.path), asset);
    }
    components
}

fn component_name(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(i) if i > 0 => base[..i].to_string(),
        _ => base.to_string(),
    }
}

fn pop_layout(assets: &mut Assets, pipeline: &sift_core::config::Config) -> Result<Option<Layout>> {
    let Some(path) = &pipeline.site.layout else {
        return Ok(None);
    };

    let mut popped = assets.pop(&[filter::with_path(path.as_str())]);
    // The layout's own frontmatter feeds the `layout` template namespace.
    popped.transform(&[&FrontmatterTransformer])?;

    let template = popped
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("layout {} not found in source", path))?;

    Ok(Some(Layout {
        template,
        child_block: pipeline.site.child_block.clone(),
    }))
}

/// Divert assets flagged for encryption through the encryption
/// transformer, then merge them back. The password template is always
/// popped so it is never published raw.
fn encrypt_protected(
    assets: &mut Assets,
    pipeline: &sift_core::config::Config,
    password: Option<&str>,
) -> Result<()> {
    let template = match &pipeline.encrypt.template {
        Some(path) => assets
            .pop(&[filter::with_path(path.as_str())])
            .into_iter()
            .next(),
        None => None,
    };

    let mut protected = assets.pop(&[filter::with_meta(&pipeline.encrypt.meta_key)]);
    if protected.is_empty() {
        return Ok(());
    }

    let password = password.context(
        "protected assets present but no password given (use --password or SIFT_PASSWORD)",
    )?;
    let template =
        template.context("protected assets present but [encrypt].template is not configured")?;

    let mut encryption = EncryptionTransformer::new(template, password);
    encryption.iterations = pipeline.encrypt.iterations;
    encryption.storage_mode = storage_mode(&pipeline.encrypt.storage);

    println!("Encrypting {} protected assets", protected.len());
    protected.transform(&[&encryption])?;
    assets.append(protected);

    Ok(())
}

fn storage_mode(name: &str) -> StorageMode {
    match name {
        "local" => StorageMode::Local,
        "session" => StorageMode::Session,
        _ => StorageMode::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_names_come_from_file_stems() {
        assert_eq!(component_name("/components/nav.html"), "nav");
        assert_eq!(component_name("/components/footer.md"), "footer");
        assert_eq!(component_name("/components/noext"), "noext");
    }

    #[test]
    fn end_to_end_build_from_a_source_tree() {
        let source = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();

        std::fs::write(
            source.path().join("index.md"),
            "---\ntitle: Home\n---\n# Welcome\n",
        )
        .unwrap();
        std::fs::create_dir_all(source.path().join("components")).unwrap();
        std::fs::write(
            source.path().join("components/footer.html"),
            "<footer>{{ global.site_name }}</footer>",
        )
        .unwrap();
        std::fs::write(
            source.path().join("layout.html"),
            concat!(
                "<html><head><title>{{ title }}</title></head>",
                "<body>{% include \"content\" %}{% include \"footer\" %}</body></html>",
            ),
        )
        .unwrap();

        let mut config = SiftConfig::default();
        config.build.source = source.path().to_string_lossy().to_string();
        config.build.output = out.path().to_string_lossy().to_string();
        config.pipeline.site.layout = Some("/layout.html".to_string());
        config.pipeline.site.base_url = Some("https://example.com".to_string());
        config
            .pipeline
            .site
            .global
            .insert("site_name".to_string(), serde_json::Value::from("sift"));

        build_site(&config, None, false).unwrap();

        let index = std::fs::read_to_string(out.path().join("index.html")).unwrap();
        assert!(index.contains("<title>Home</title>"));
        assert!(index.contains("<h1>Welcome</h1>"));
        assert!(index.contains("<footer>sift</footer>"));
        // The layout and components are inputs, not outputs.
        assert!(!out.path().join("layout.html").exists());
        assert!(!out.path().join("components/footer.html").exists());

        let sitemap = std::fs::read_to_string(out.path().join("sitemap.xml")).unwrap();
        assert!(sitemap.contains("<loc>https://example.com/index.html</loc>"));
    }
}
