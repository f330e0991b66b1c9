use chrono::{DateTime, Utc};
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_keeps_millisecond_precision() {
        let now = Utc::now();
        let bson = chrono_to_bson(now);
        assert_eq!(bson.timestamp_millis(), now.timestamp_millis());
    }
}
