//! 日期时间工具：格式常量、本地时间类型、日期范围计算

use chrono::{
    DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Weekday,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::core::error::{CoreError, CoreResult};

pub const DATE_YEAR_FORMAT: &str = "%Y";
pub const DATE_YEAR_MONTH_FORMAT: &str = "%Y-%m";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATE_FORMAT_CHINESE: &str = "%Y年%m月%d日";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATETIME_FORMAT_CHINESE: &str = "%Y年%m月%d日 %H时%M分%S秒";

/// 1 天秒数
pub const DAY_SECONDS: i64 = 3600 * 24;

pub fn format_now(layout: &str) -> String {
    Local::now().format(layout).to_string()
}

/// 本地时间，JSON 中以 `YYYY-MM-DD HH:MM:SS` 表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "database", derive(sqlx::Type), sqlx(transparent))]
pub struct LocalTime(pub DateTime<Local>);

impl LocalTime {
    pub fn now() -> Self {
        LocalTime(Local::now())
    }

    /// 本地时区下的零点
    pub fn today() -> Self {
        let today = Local::now().date_naive().and_time(NaiveTime::MIN);
        Self::from_naive(today).unwrap_or_else(Self::now)
    }

    pub fn from_naive(value: NaiveDateTime) -> Option<Self> {
        Local.from_local_datetime(&value).earliest().map(LocalTime)
    }

    pub fn parse(text: &str) -> CoreResult<Self> {
        let naive = NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT)
            .map_err(|e| CoreError::BadRequest(format!("时间格式错误: {}", e)))?;
        Self::from_naive(naive)
            .ok_or_else(|| CoreError::BadRequest(format!("无效的本地时间: {}", text)))
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.0.naive_local()
    }

    pub fn format(&self, layout: &str) -> String {
        self.0.format(layout).to_string()
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATETIME_FORMAT))
    }
}

impl From<DateTime<Local>> for LocalTime {
    fn from(value: DateTime<Local>) -> Self {
        LocalTime(value)
    }
}

impl Serialize for LocalTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LocalTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        LocalTime::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// 时间范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// 字符串时间范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeString {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn of_string(&self) -> DateRangeString {
        DateRangeString {
            start: self.start.format(DATETIME_FORMAT).to_string(),
            end: self.end.format(DATETIME_FORMAT).to_string(),
        }
    }

    fn whole_days(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange {
            start: start_of_day(start),
            end: end_of_day(end),
        }
    }
}

/// 前端传入的时间区间 `["2024-01-01 00:00:00", "2024-01-31 23:59:59"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateAt(pub [String; 2]);

impl DateAt {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        DateAt([start.into(), end.into()])
    }

    pub fn start(&self) -> &str {
        &self.0[0]
    }

    pub fn end(&self) -> &str {
        &self.0[1]
    }

    /// 解析 `start,end` 形式的查询参数
    pub fn parse(text: &str) -> CoreResult<Self> {
        let mut parts = text.splitn(2, ',');
        match (parts.next(), parts.next()) {
            (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => {
                Ok(DateAt::new(start.trim(), end.trim()))
            }
            _ => Err(CoreError::BadRequest(format!("时间范围格式错误: {}", text))),
        }
    }
}

impl From<DateRange> for DateAt {
    fn from(range: DateRange) -> Self {
        let s = range.of_string();
        DateAt::new(s.start, s.end)
    }
}

pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + Duration::seconds(DAY_SECONDS - 1)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.day0() as i64)
}

fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date) + Months::new(1) - Duration::days(1)
}

fn first_of_year(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.ordinal0() as i64)
}

/// 在日期上加减天数，并把时间设为指定的时分秒
pub fn time_add_days(t: NaiveDateTime, days: i64, hour: u32, min: u32, sec: u32) -> NaiveDateTime {
    let date = (t + Duration::days(days)).date();
    let secs = (hour * 3600 + min * 60 + sec) as i64;
    start_of_day(date) + Duration::seconds(secs)
}

/// 距离 `t` 是否已超过 `days` 天
pub fn is_time_exceeded(t: NaiveDateTime, days: i64, now: NaiveDateTime) -> bool {
    now - t > Duration::days(days)
}

fn parse_date(text: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|e| CoreError::BadRequest(format!("日期解析失败：{}", e)))
}

fn parse_datetime(text: &str) -> CoreResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT)
        .map_err(|e| CoreError::BadRequest(format!("时间解析失败：{}", e)))
}

/// 是否是未来日期
pub fn is_after_date(date: &str, now: NaiveDateTime) -> CoreResult<bool> {
    Ok(start_of_day(parse_date(date)?) > now)
}

/// 是否是过去日期
pub fn is_before_date(date: &str, now: NaiveDateTime) -> CoreResult<bool> {
    Ok(start_of_day(parse_date(date)?) < now)
}

/// 是否是未来时间
pub fn is_after_datetime(datetime: &str, now: NaiveDateTime) -> CoreResult<bool> {
    Ok(parse_datetime(datetime)? > now)
}

/// 是否是过去时间
pub fn is_before_datetime(datetime: &str, now: NaiveDateTime) -> CoreResult<bool> {
    Ok(parse_datetime(datetime)? < now)
}

fn consecutive_dates(first: NaiveDate, count: i64) -> Vec<String> {
    (0..count)
        .map(|i| (first + Duration::days(i)).format(DATE_FORMAT).to_string())
        .collect()
}

/// 以 `end` 结尾的最近 7 天
pub fn last_week_dates(end: NaiveDate) -> Vec<String> {
    consecutive_dates(end - Duration::days(6), 7)
}

/// 以 `end` 结尾的最近 30 天
pub fn last_month_dates(end: NaiveDate) -> Vec<String> {
    consecutive_dates(end - Duration::days(29), 30)
}

/// 从 `today` 的次日开始的 30 天
pub fn next_month_dates(today: NaiveDate) -> Vec<String> {
    consecutive_dates(today + Duration::days(1), 30)
}

/// 本月时间范围
pub fn this_month_range(today: NaiveDate) -> DateRange {
    DateRange::whole_days(first_of_month(today), last_of_month(today))
}

/// 本季时间范围
pub fn this_quarter_range(today: NaiveDate) -> DateRange {
    let first = first_of_month(today) - Months::new(today.month0() % 3);
    let last = first + Months::new(3) - Duration::days(1);
    DateRange::whole_days(first, last)
}

/// 今年时间范围
pub fn this_year_range(today: NaiveDate) -> DateRange {
    let first = first_of_year(today);
    DateRange::whole_days(first, first + Months::new(12) - Duration::days(1))
}

/// 获取日期范围：`today`、`yesterday` 或 `YYYY-MM-DD`
pub fn day_range(date: &str, today: NaiveDate) -> CoreResult<DateRange> {
    let day = match date {
        "yesterday" => today - Duration::days(1),
        "today" => today,
        other => parse_date(other)?,
    };
    Ok(DateRange::whole_days(day, day))
}

/// 获取指定月（`YYYY-MM`）的日期范围
pub fn month_range(month: &str) -> CoreResult<DateRange> {
    let first = parse_date(&format!("{}-01", month.trim()))?;
    Ok(DateRange::whole_days(first, last_of_month(first)))
}

/// 昨日开始和结束时间
pub fn last_day_between(today: NaiveDate) -> DateRange {
    let day = today - Duration::days(1);
    DateRange::whole_days(day, day)
}

/// 上周（周一至周日）开始和结束时间
pub fn last_week_between(today: NaiveDate) -> DateRange {
    let this_monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let last_monday = this_monday - Duration::days(7);
    debug_assert_eq!(last_monday.weekday(), Weekday::Mon);
    DateRange::whole_days(last_monday, last_monday + Duration::days(6))
}

/// 上月开始和结束时间
pub fn last_month_between(today: NaiveDate) -> DateRange {
    let first = first_of_month(today) - Months::new(1);
    DateRange::whole_days(first, last_of_month(first))
}

/// 去年开始和结束时间
pub fn last_year_between(today: NaiveDate) -> DateRange {
    let first = first_of_year(today) - Months::new(12);
    DateRange::whole_days(first, first + Months::new(12) - Duration::days(1))
}

/// 指定年（`YYYY`）开始和结束时间
pub fn year_between(year: &str) -> CoreResult<DateRange> {
    let first = parse_date(&format!("{}-01-01", year.trim()))?;
    Ok(this_year_range(first))
}

/// 时间范围内的所有月份，格式 `YYYY-MM`
pub fn generate_months(start_date: &str, end_date: &str) -> CoreResult<Vec<String>> {
    let end = parse_date(end_date)?;
    let mut current = first_of_month(parse_date(start_date)?);
    let mut months = Vec::new();
    while current <= end {
        months.push(current.format(DATE_YEAR_MONTH_FORMAT).to_string());
        current = current + Months::new(1);
    }
    Ok(months)
}

/// 时间范围内的所有日期，格式 `YYYY-MM-DD`
pub fn generate_dates(range: &DateRange) -> Vec<String> {
    let mut dates = Vec::new();
    let mut current = range.start;
    while current <= range.end {
        dates.push(current.format(DATE_FORMAT).to_string());
        current += Duration::days(1);
    }
    dates
}

pub fn is_today(t: NaiveDateTime, today: NaiveDate) -> bool {
    t.date() == today
}

/// 依次尝试多个格式解析时间字符串
pub fn parse_time_text(text: &str, layouts: &[&str]) -> CoreResult<NaiveDateTime> {
    let text = text.trim();
    layouts
        .iter()
        .find_map(|layout| {
            NaiveDateTime::parse_from_str(text, layout)
                .ok()
                .or_else(|| NaiveDate::parse_from_str(text, layout).ok().map(start_of_day))
        })
        .ok_or_else(|| CoreError::BadRequest(format!("invalid date format: {}", text)))
}

/// 日期字符串转时间，支持 `2024-01-02` 与 `2024-1-2`
pub fn parse_date_text(text: &str) -> CoreResult<NaiveDateTime> {
    parse_time_text(text, &[DATE_FORMAT, "%Y-%-m-%-d"])
}

/// 日期时间字符串转时间，支持补零与不补零两种写法
pub fn parse_datetime_text(text: &str) -> CoreResult<NaiveDateTime> {
    parse_time_text(text, &[DATETIME_FORMAT, "%Y-%-m-%-d %-H:%-M:%-S"])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dt(text: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn test_month_and_quarter_ranges() {
        let r = this_month_range(date(2024, 2, 10));
        assert_eq!(r.of_string().start, "2024-02-01 00:00:00");
        assert_eq!(r.of_string().end, "2024-02-29 23:59:59");

        let q = this_quarter_range(date(2024, 8, 15));
        assert_eq!(q.start, dt("2024-07-01 00:00:00"));
        assert_eq!(q.end, dt("2024-09-30 23:59:59"));

        let y = this_year_range(date(2023, 6, 1));
        assert_eq!(y.start, dt("2023-01-01 00:00:00"));
        assert_eq!(y.end, dt("2023-12-31 23:59:59"));
    }

    #[test]
    fn test_day_and_month_range() {
        let today = date(2024, 3, 1);
        let r = day_range("yesterday", today).unwrap();
        assert_eq!(r.start, dt("2024-02-29 00:00:00"));
        assert_eq!(r.end, dt("2024-02-29 23:59:59"));
        assert!(day_range("bad", today).is_err());

        let m = month_range("2023-02").unwrap();
        assert_eq!(m.end, dt("2023-02-28 23:59:59"));
    }

    #[test]
    fn test_last_periods() {
        // 2024-05-15 是周三
        let today = date(2024, 5, 15);
        let w = last_week_between(today);
        assert_eq!(w.start, dt("2024-05-06 00:00:00"));
        assert_eq!(w.end, dt("2024-05-12 23:59:59"));

        let m = last_month_between(date(2024, 3, 31));
        assert_eq!(m.start, dt("2024-02-01 00:00:00"));
        assert_eq!(m.end, dt("2024-02-29 23:59:59"));

        let y = last_year_between(today);
        assert_eq!(y.start, dt("2023-01-01 00:00:00"));
        assert_eq!(y.end, dt("2023-12-31 23:59:59"));
    }

    #[test]
    fn test_generate_months_and_dates() {
        let months = generate_months("2024-01-31", "2024-03-10").unwrap();
        assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);

        let dates = generate_dates(&DateRange::whole_days(date(2024, 2, 28), date(2024, 3, 1)));
        assert_eq!(dates, vec!["2024-02-28", "2024-02-29", "2024-03-01"]);

        let week = last_week_dates(date(2024, 1, 3));
        assert_eq!(week.first().unwrap(), "2023-12-28");
        assert_eq!(week.len(), 7);
        assert_eq!(next_month_dates(date(2024, 1, 31))[0], "2024-02-01");
    }

    #[test]
    fn test_time_add_days() {
        let t = time_add_days(dt("2024-01-31 10:20:30"), 1, 23, 59, 59);
        assert_eq!(t, dt("2024-02-01 23:59:59"));
    }

    #[test]
    fn test_parse_text_layouts() {
        assert_eq!(parse_date_text(" 2024-1-2 ").unwrap(), dt("2024-01-02 00:00:00"));
        assert_eq!(
            parse_datetime_text("2024-1-2 3:4:5").unwrap(),
            dt("2024-01-02 03:04:05")
        );
        assert!(parse_date_text("02/01/2024").is_err());
    }

    #[test]
    fn test_local_time_json() {
        let t = LocalTime::parse("2024-06-01 08:30:00").unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2024-06-01 08:30:00\"");
        let back: LocalTime = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_date_at_parse() {
        let at = DateAt::parse("2024-01-01 00:00:00,2024-01-31 23:59:59").unwrap();
        assert_eq!(at.start(), "2024-01-01 00:00:00");
        assert_eq!(at.end(), "2024-01-31 23:59:59");
        assert!(DateAt::parse("2024-01-01").is_err());
    }
}
