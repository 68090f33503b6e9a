use aws_sdk_s3::Client as S3Client;
use aws_config::BehaviorVersion;
use aws_types::region::Region;

use crate::config::Config;

pub async fn create_s3_client(config: &Config) -> S3Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }
    let aws_config = loader.load().await;

    // MinIO and other S3-compatible stores need a custom endpoint and path-style addressing
    let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);
    if let Some(endpoint) = &config.s3_endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    S3Client::from_conf(builder.build())
}
