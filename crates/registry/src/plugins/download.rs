//! Plain HTTP download of a product's `downloadLink`.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use eogate_types::{EoProduct, NOT_AVAILABLE};
use eogate_util::{HttpClient, HttpRequest, sanitize_file_name};
use tracing::info;

use super::{AuthHandle, DownloadPlugin};
use crate::{
    catalog::PluginContext,
    error::{ProviderError, RegistryError},
};

pub struct HttpDownload {
    provider: String,
    output_dir: Option<PathBuf>,
    http: Arc<dyn HttpClient>,
}

impl HttpDownload {
    pub fn new(context: &PluginContext<'_>) -> Result<Self, RegistryError> {
        Ok(Self {
            provider: context.provider.name.clone(),
            output_dir: context.config.output_dir.clone(),
            http: Arc::clone(&context.http),
        })
    }

    /// Local file name: the sanitized title plus the link's extension.
    fn file_name(product: &EoProduct, link: &str) -> String {
        let title = product.title().unwrap_or_else(|| "product".to_string());
        let mut name = sanitize_file_name(&title);
        let extension = url::Url::parse(link)
            .ok()
            .and_then(|url| url.path_segments().and_then(|mut segments| segments.next_back().map(str::to_string)))
            .and_then(|last| Path::new(&last).extension().map(|extension| extension.to_string_lossy().into_owned()));
        if let Some(extension) = extension
            && !name.ends_with(&format!(".{extension}"))
        {
            name.push('.');
            name.push_str(&extension);
        }
        name
    }
}

impl DownloadPlugin for HttpDownload {
    fn download(&mut self, product: &EoProduct, auth: Option<&AuthHandle>, output_dir: Option<&Path>) -> Result<PathBuf, ProviderError> {
        let Some(link) = product
            .property_str("downloadLink")
            .filter(|link| !link.is_empty() && *link != NOT_AVAILABLE)
            .map(str::to_string)
        else {
            return Err(ProviderError::Download(format!(
                "product {} of {} has no download link",
                product.id().unwrap_or_default(),
                self.provider
            )));
        };

        let directory = output_dir
            .map(Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .unwrap_or_else(std::env::temp_dir);
        let target = directory.join(Self::file_name(product, &link));
        if target.exists() {
            info!(provider = %self.provider, path = %target.display(), "product already downloaded");
            return Ok(target);
        }

        let mut request = HttpRequest::get(link);
        if let Some(auth) = auth {
            request = auth.apply(request);
        }
        let response = self.http.execute(&request)?;
        fs::create_dir_all(&directory).map_err(|source| ProviderError::Io {
            path: directory.clone(),
            source,
        })?;
        fs::write(&target, &response.body).map_err(|source| ProviderError::Io {
            path: target.clone(),
            source,
        })?;
        info!(provider = %self.provider, path = %target.display(), byte_count = response.body.len(), "product downloaded");
        Ok(target)
    }
}
