//! Container image URIs for the pipeline's jobs

/// Registry accounts hosting the scikit-learn framework images
const SKLEARN_ACCOUNTS: &[(&str, &str)] = &[
    ("ap-northeast-1", "354813040037"),
    ("ap-northeast-2", "366743142698"),
    ("ap-south-1", "720646828776"),
    ("ap-southeast-1", "121021644041"),
    ("ap-southeast-2", "783357654285"),
    ("ca-central-1", "341280168497"),
    ("eu-central-1", "492215442770"),
    ("eu-north-1", "662702820516"),
    ("eu-west-1", "141502667606"),
    ("eu-west-2", "764974769150"),
    ("eu-west-3", "659782779980"),
    ("sa-east-1", "737474898029"),
    ("us-east-1", "683313688378"),
    ("us-east-2", "257758044811"),
    ("us-west-1", "746614075791"),
    ("us-west-2", "246618743249"),
];

/// Repository the preprocessing image is pushed to in the pipeline's account
pub const PREPROCESS_REPOSITORY: &str = "mlpipeline";

/// The scikit-learn CPU image for `version` in `region`, if the region is known
pub fn framework_image_uri(region: &str, version: &str) -> Option<String> {
    SKLEARN_ACCOUNTS
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, account)| {
            format!(
                "{}.dkr.ecr.{}.amazonaws.com/sagemaker-scikit-learn:{}-cpu-py3",
                account, region, version
            )
        })
}

/// This crate's image in the execution role's account
///
/// The image runs `mlpipeline preprocess` and carries the `aws` CLI.
pub fn preprocess_image_uri(role_arn: &str, region: &str) -> Option<String> {
    let account = role_arn.split(':').nth(4)?;
    if account.is_empty() || !account.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!(
        "{}.dkr.ecr.{}.amazonaws.com/{}:{}",
        account,
        region,
        PREPROCESS_REPOSITORY,
        env!("CARGO_PKG_VERSION")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framework_image() {
        assert_eq!(
            framework_image_uri("us-east-1", "0.23-1").as_deref(),
            Some("683313688378.dkr.ecr.us-east-1.amazonaws.com/sagemaker-scikit-learn:0.23-1-cpu-py3")
        );
        assert!(framework_image_uri("mars-north-1", "0.23-1").is_none());
    }

    #[test]
    fn test_preprocess_image_from_role() {
        let image = preprocess_image_uri("arn:aws:iam::123456789012:role/Exec", "eu-west-1").unwrap();
        assert_eq!(
            image,
            format!(
                "123456789012.dkr.ecr.eu-west-1.amazonaws.com/mlpipeline:{}",
                env!("CARGO_PKG_VERSION")
            )
        );
        assert!(preprocess_image_uri("Exec", "eu-west-1").is_none());
        assert!(preprocess_image_uri("arn:aws:iam:::role/Exec", "eu-west-1").is_none());
    }
}
