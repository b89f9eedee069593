//! Text templates for everything the generator writes.
//!
//! Inputs are substituted verbatim. Names or URLs carrying quotes or shell
//! metacharacters will produce broken launchers; the catalog is trusted.

use std::fmt::Write;

use serde_json::json;

use crate::catalog::{AppDescriptor, Catalog, StoreInfo};
use crate::engine::models::Platform;
use crate::util::escape_html;

pub const HTML_ENTRY: &str = "app.html";
pub const README_ENTRY: &str = "README.txt";

/// The three text files packed into one placeholder artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedBundle {
    pub launcher_name: &'static str,
    pub launcher: String,
    pub html: String,
    pub readme: String,
}

pub fn render(app: &AppDescriptor, platform: Platform, store: &StoreInfo) -> RenderedBundle {
    RenderedBundle {
        launcher_name: platform.launcher_name(),
        launcher: render_launcher(app, platform, store),
        html: render_html_wrapper(app, store),
        readme: render_readme(app, platform, store),
    }
}

pub fn render_launcher(app: &AppDescriptor, platform: Platform, store: &StoreInfo) -> String {
    match platform {
        Platform::Windows => windows_launcher(app, store),
        Platform::Mac => mac_launcher(app, store),
        Platform::Linux => linux_launcher(app, store),
    }
}

fn windows_launcher(app: &AppDescriptor, store: &StoreInfo) -> String {
    let name = &app.name;
    let url = &app.url;
    let store_name = &store.store_name;
    format!(
        "@echo off\r\n\
         title {name} - {store_name}\r\n\
         echo Starting {name}...\r\n\
         echo.\r\n\
         start \"\" \"{url}\"\r\n\
         echo.\r\n\
         echo If the browser doesn't open automatically, please visit:\r\n\
         echo {url}\r\n\
         echo.\r\n\
         pause\r\n"
    )
}

fn mac_launcher(app: &AppDescriptor, store: &StoreInfo) -> String {
    let name = &app.name;
    let url = &app.url;
    let store_name = &store.store_name;
    format!(
        "#!/bin/bash\n\
         # {name} - {store_name} Launcher\n\
         echo \"Starting {name}...\"\n\
         open \"{url}\"\n"
    )
}

const LINUX_BROWSERS: [&str; 6] = [
    "xdg-open",
    "sensible-browser",
    "x-www-browser",
    "firefox",
    "chromium-browser",
    "google-chrome",
];

fn linux_launcher(app: &AppDescriptor, store: &StoreInfo) -> String {
    let name = &app.name;
    let url = &app.url;
    let mut script = String::new();
    let _ = writeln!(script, "#!/bin/bash");
    let _ = writeln!(script, "# {name} - {} Launcher", store.store_name);
    let _ = writeln!(script, "echo \"Starting {name}...\"");
    let _ = writeln!(script);
    for (idx, browser) in LINUX_BROWSERS.iter().enumerate() {
        let keyword = if idx == 0 { "if" } else { "elif" };
        let _ = writeln!(script, "{keyword} command -v {browser} >/dev/null 2>&1; then");
        let _ = writeln!(script, "    {browser} \"{url}\" >/dev/null 2>&1 &");
    }
    let _ = writeln!(script, "else");
    let _ = writeln!(script, "    echo \"No suitable browser found.\"");
    let _ = writeln!(script, "    echo \"Please open {url} in your browser\"");
    let _ = writeln!(script, "    exit 1");
    let _ = writeln!(script, "fi");
    script
}

pub fn render_html_wrapper(app: &AppDescriptor, store: &StoreInfo) -> String {
    let name = &app.name;
    let url = &app.url;
    let store_name = &store.store_name;
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{name} - {store_name}</title>
    <style>
        body {{
            margin: 0;
            padding: 0;
            font-family: Arial, sans-serif;
            background: #0a0a12;
            color: #00f7ff;
            overflow: hidden;
        }}
        .app-frame {{
            width: 100vw;
            height: 100vh;
            border: none;
            background: white;
        }}
        .loading {{
            position: fixed;
            top: 50%;
            left: 50%;
            transform: translate(-50%, -50%);
            font-size: 18px;
            color: #00f7ff;
        }}
        .loading.hidden {{
            display: none;
        }}
    </style>
</head>
<body>
    <div class="loading" id="loading">Loading {name}...</div>
    <iframe src="{url}" class="app-frame" id="appFrame" onload="hideLoading()"></iframe>

    <script>
        function hideLoading() {{
            document.getElementById('loading').classList.add('hidden');
        }}
        setTimeout(hideLoading, 3000);
    </script>
</body>
</html>
"#
    )
}

pub fn render_readme(app: &AppDescriptor, platform: Platform, store: &StoreInfo) -> String {
    let name = &app.name;
    let mut readme = String::new();
    let _ = writeln!(readme, "{name} - {}", store.store_name);
    let _ = writeln!(readme);
    let _ = writeln!(readme, "This is a web app wrapper for {name} ({}).", platform.label());
    let _ = writeln!(
        readme,
        "It is a placeholder download: the archive only opens the web version."
    );
    let _ = writeln!(readme);
    let _ = writeln!(readme, "To run this app:");
    let _ = writeln!(readme, "1. Extract this file");
    match platform {
        Platform::Windows => {
            let _ = writeln!(readme, "2. Run launcher.bat or open app.html in your browser");
        }
        Platform::Mac | Platform::Linux => {
            let _ = writeln!(readme, "2. Run: chmod +x launcher.sh && ./launcher.sh");
            let _ = writeln!(readme, "   Or open app.html in your browser");
        }
    }
    let _ = writeln!(readme, "3. The app will open in your default web browser");
    let _ = writeln!(readme);
    let _ = writeln!(readme, "Original URL: {}", app.url);
    if !store.publisher.is_empty() {
        let _ = writeln!(readme);
        let _ = writeln!(readme, "Created by {} - {}", store.publisher, store.store_name);
    }
    readme
}

/// `index.html` for the downloads root, linking every artifact of every app.
pub fn render_download_page(catalog: &Catalog) -> String {
    let store_name = escape_html(&catalog.store.store_name);
    let mut sections = String::new();
    for app in &catalog.apps {
        let _ = writeln!(sections, "        <div class=\"download-section\">");
        let _ = writeln!(sections, "            <h2>{}</h2>", escape_html(&app.name));
        for platform in Platform::ALL {
            let file = platform.artifact_file_name(&app.id);
            let _ = writeln!(
                sections,
                "            <a href=\"/{dir}/{file}\" class=\"download-btn\">Download for {label}</a>",
                dir = platform.dir_name(),
                file = escape_html(&file),
                label = platform.label(),
            );
        }
        let _ = writeln!(sections, "        </div>");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{store_name} - Downloads</title>
    <style>
        body {{ font-family: Arial, sans-serif; background: #0a0a12; color: #00f7ff; margin: 0; padding: 20px; }}
        .container {{ max-width: 800px; margin: 0 auto; }}
        h1 {{ text-align: center; color: #ff00f7; }}
        .download-section {{ background: rgba(30, 30, 61, 0.5); border-radius: 10px; padding: 20px; margin: 20px 0; }}
        .download-btn {{ display: inline-block; color: white; margin: 10px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{store_name} - Downloads</h1>
{sections}        <div class="download-section">
            <h2>Browse</h2>
            <a href="/windows/" class="download-btn">Windows Downloads</a>
            <a href="/mac/" class="download-btn">macOS Downloads</a>
            <a href="/linux/" class="download-btn">Linux Downloads</a>
        </div>
    </div>
</body>
</html>
"#
    )
}

/// `package.json` for an Electron wrapper project built by electron-builder.
pub fn render_electron_package(app: &AppDescriptor, store: &StoreInfo) -> String {
    let app_id = format!(
        "com.{}.{}",
        slug(&store.publisher).unwrap_or_else(|| "appwrap".into()),
        app.id.replace(['-', '_', '.'], "")
    );
    let package = json!({
        "name": app.id,
        "version": "1.0.0",
        "description": format!("{} - {}", app.name, store.store_name),
        "main": "main.js",
        "scripts": {
            "start": "electron .",
            "build": "electron-builder",
            (Platform::Windows.npm_script()): "electron-builder --win",
            (Platform::Mac.npm_script()): "electron-builder --mac",
            (Platform::Linux.npm_script()): "electron-builder --linux",
        },
        "author": store.publisher,
        "license": "MIT",
        "devDependencies": {
            "electron": "^25.0.0",
            "electron-builder": "^24.0.0",
        },
        "build": {
            "appId": app_id,
            "productName": app.name,
            "directories": { "output": crate::env::NATIVE_DIST_DIR },
            "files": ["**/*", "!node_modules/**/*"],
            "win": { "target": "nsis" },
            "mac": { "target": "dmg" },
            "linux": { "target": "AppImage" },
        },
    });
    let mut text = serde_json::to_string_pretty(&package).unwrap_or_default();
    text.push('\n');
    text
}

/// Electron entry point that shows the web app in a window.
pub fn render_electron_main(app: &AppDescriptor) -> String {
    let name = &app.name;
    let url = &app.url;
    format!(
        r#"const {{ app, BrowserWindow }} = require('electron');

function createWindow() {{
    const win = new BrowserWindow({{
        width: 1200,
        height: 800,
        title: '{name}',
        webPreferences: {{
            nodeIntegration: false,
            contextIsolation: true
        }}
    }});
    win.loadURL('{url}');
}}

app.whenReady().then(createWindow);

app.on('window-all-closed', () => {{
    if (process.platform !== 'darwin') {{
        app.quit();
    }}
}});

app.on('activate', () => {{
    if (BrowserWindow.getAllWindows().length === 0) {{
        createWindow();
    }}
}});
"#
    )
}

fn slug(text: &str) -> Option<String> {
    let slug: String = text
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (!slug.is_empty()).then_some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> StoreInfo {
        StoreInfo {
            store_name: "Cosmic App Store".into(),
            publisher: "Cosmos Coderr".into(),
        }
    }

    fn demo() -> AppDescriptor {
        AppDescriptor::new("demo-app", "https://example.com/demo")
    }

    #[test]
    fn every_platform_renders_non_empty_files() {
        for platform in Platform::ALL {
            let bundle = render(&demo(), platform, &store());
            assert_eq!(bundle.launcher_name, platform.launcher_name());
            assert!(bundle.launcher.contains("https://example.com/demo"));
            assert!(bundle.html.contains("https://example.com/demo"));
            assert!(bundle.readme.contains("Original URL: https://example.com/demo"));
        }
    }

    #[test]
    fn windows_launcher_starts_url() {
        let launcher = render_launcher(&demo(), Platform::Windows, &store());
        assert!(launcher.starts_with("@echo off"));
        assert!(launcher.contains("start \"\" \"https://example.com/demo\""));
        assert!(launcher.contains("title Demo App - Cosmic App Store"));
    }

    #[test]
    fn unix_launchers_use_platform_openers() {
        let mac = render_launcher(&demo(), Platform::Mac, &store());
        assert!(mac.starts_with("#!/bin/bash"));
        assert!(mac.contains("open \"https://example.com/demo\""));

        let linux = render_launcher(&demo(), Platform::Linux, &store());
        assert!(linux.contains("if command -v xdg-open"));
        assert!(linux.contains("elif command -v google-chrome"));
        assert!(linux.contains("exit 1"));
    }

    #[test]
    fn html_wrapper_embeds_url_in_iframe() {
        let app = demo().with_name("Demo <Beta>");
        let html = render_html_wrapper(&app, &store());
        assert!(html.contains("<iframe src=\"https://example.com/demo\""));
        assert!(html.contains("<title>Demo <Beta> - Cosmic App Store</title>"));
    }

    #[test]
    fn readme_mentions_platform_steps_and_publisher() {
        let win = render_readme(&demo(), Platform::Windows, &store());
        assert!(win.contains("launcher.bat"));
        assert!(win.contains("Created by Cosmos Coderr"));
        let linux = render_readme(&demo(), Platform::Linux, &store());
        assert!(linux.contains("chmod +x launcher.sh"));

        let anonymous = StoreInfo {
            store_name: "S".into(),
            publisher: String::new(),
        };
        assert!(!render_readme(&demo(), Platform::Mac, &anonymous).contains("Created by"));
    }

    #[test]
    fn download_page_links_every_artifact() {
        let catalog = Catalog::new(store(), vec![demo()]).unwrap();
        let page = render_download_page(&catalog);
        assert!(page.contains("href=\"/windows/demo-app-windows.exe\""));
        assert!(page.contains("href=\"/mac/demo-app-mac.dmg\""));
        assert!(page.contains("href=\"/linux/demo-app-linux.AppImage\""));
    }

    #[test]
    fn electron_package_declares_build_scripts() {
        let text = render_electron_package(&demo(), &store());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["name"], "demo-app");
        assert_eq!(value["scripts"]["build-win"], "electron-builder --win");
        assert_eq!(value["build"]["appId"], "com.cosmoscoderr.demoapp");
        assert_eq!(value["build"]["directories"]["output"], "dist");

        let main = render_electron_main(&demo());
        assert!(main.contains("win.loadURL('https://example.com/demo')"));
    }
}
