use chrono::NaiveTime;

pub fn default_segment_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).expect("valid static default segment start")
}

pub fn default_segment_end() -> NaiveTime {
    NaiveTime::from_hms_opt(20, 0, 0).expect("valid static default segment end")
}
