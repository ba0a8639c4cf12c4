use pac_core::{ElementStatus, JobStatus};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn strings(self) -> &'static Strings {
        match self {
            Locale::En => &EN,
            Locale::Zh => &ZH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "english" => Ok(Locale::En),
            "zh" | "zh-cn" | "chinese" => Ok(Locale::Zh),
            other => Err(format!("unknown locale '{other}' (expected en or zh)")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every display string the console shows. Each locale must fill every field.
#[derive(Debug)]
pub struct Strings {
    pub app_title: &'static str,
    pub mode_dashboard: &'static str,
    pub mode_grid: &'static str,
    pub mode_jobs: &'static str,
    pub stream: &'static str,
    pub conn_closed: &'static str,
    pub conn_connecting: &'static str,
    pub conn_open: &'static str,
    pub conn_error: &'static str,
    pub banner_offline: &'static str,
    pub kpi_title: &'static str,
    pub kpi_jobs: &'static str,
    pub kpi_elements: &'static str,
    pub kpi_mean_amplitude: &'static str,
    pub job_pending: &'static str,
    pub job_running: &'static str,
    pub job_completed: &'static str,
    pub job_failed: &'static str,
    pub element_idle: &'static str,
    pub element_active: &'static str,
    pub element_fault: &'static str,
    pub data_loading: &'static str,
    pub data_empty: &'static str,
    pub data_failed: &'static str,
    pub col_id: &'static str,
    pub col_name: &'static str,
    pub col_priority: &'static str,
    pub col_resource: &'static str,
    pub col_status: &'static str,
    pub col_created: &'static str,
    pub priority_high: &'static str,
    pub priority_medium: &'static str,
    pub priority_low: &'static str,
    pub default_resource: &'static str,
    pub legend: &'static str,
    pub ramp: &'static str,
    pub detail_element: &'static str,
    pub detail_status: &'static str,
    pub detail_amplitude: &'static str,
    pub detail_phase: &'static str,
    pub detail_code: &'static str,
    pub detail_job: &'static str,
    pub grid_too_small: &'static str,
    pub activity: &'static str,
    pub no_activity: &'static str,
    pub help_title: &'static str,
    pub help_modes: &'static str,
    pub help_tab: &'static str,
    pub help_cursor: &'static str,
    pub help_reload: &'static str,
    pub help_reconnect: &'static str,
    pub help_quit: &'static str,
    pub note_ready: &'static str,
    pub note_reloading: &'static str,
    pub note_reloaded: &'static str,
    pub note_reconnecting: &'static str,
}

impl Strings {
    pub fn job_status(&self, status: JobStatus) -> &'static str {
        match status {
            JobStatus::Pending => self.job_pending,
            JobStatus::Running => self.job_running,
            JobStatus::Completed => self.job_completed,
            JobStatus::Failed => self.job_failed,
        }
    }

    pub fn element_status(&self, status: ElementStatus) -> &'static str {
        match status {
            ElementStatus::Idle => self.element_idle,
            ElementStatus::Active => self.element_active,
            ElementStatus::Fault => self.element_fault,
        }
    }
}

pub static EN: Strings = Strings {
    app_title: "Phased Array Console",
    mode_dashboard: "Dashboard",
    mode_grid: "Array",
    mode_jobs: "Jobs",
    stream: "Stream",
    conn_closed: "Closed",
    conn_connecting: "Connecting",
    conn_open: "Open",
    conn_error: "Error",
    banner_offline: "Live updates unavailable. Press c to reconnect.",
    kpi_title: "Overview",
    kpi_jobs: "Jobs",
    kpi_elements: "Elements",
    kpi_mean_amplitude: "Mean active amplitude",
    job_pending: "Pending",
    job_running: "Running",
    job_completed: "Completed",
    job_failed: "Failed",
    element_idle: "Idle",
    element_active: "Active",
    element_fault: "Fault",
    data_loading: "Loading",
    data_empty: "No data yet",
    data_failed: "Fetch failed",
    col_id: "ID",
    col_name: "Name",
    col_priority: "Priority",
    col_resource: "Resource",
    col_status: "Status",
    col_created: "Created",
    priority_high: "High",
    priority_medium: "Medium",
    priority_low: "Low",
    default_resource: "Antenna Array",
    legend: "Legend",
    ramp: "Amplitude 0-100",
    detail_element: "Element",
    detail_status: "Status",
    detail_amplitude: "Amplitude",
    detail_phase: "Phase",
    detail_code: "Code",
    detail_job: "Job",
    grid_too_small: "Window too small for the array grid",
    activity: "Recent events",
    no_activity: "No events received",
    help_title: "Controls",
    help_modes: "1/2/3    switch view (Dashboard/Array/Jobs)",
    help_tab: "Tab      cycle view",
    help_cursor: "arrows   move grid cursor (hjkl also)",
    help_reload: "r        reload snapshot",
    help_reconnect: "c        reconnect stream",
    help_quit: "q        quit",
    note_ready: "ready (? help)",
    note_reloading: "reloading snapshot",
    note_reloaded: "snapshot loaded",
    note_reconnecting: "reconnecting stream",
};

pub static ZH: Strings = Strings {
    app_title: "相控阵控制台",
    mode_dashboard: "总览",
    mode_grid: "阵列",
    mode_jobs: "任务",
    stream: "数据流",
    conn_closed: "已关闭",
    conn_connecting: "连接中",
    conn_open: "已连接",
    conn_error: "错误",
    banner_offline: "实时更新不可用，按 c 重新连接。",
    kpi_title: "概况",
    kpi_jobs: "任务",
    kpi_elements: "阵元",
    kpi_mean_amplitude: "活动阵元平均幅度",
    job_pending: "等待中",
    job_running: "运行中",
    job_completed: "已完成",
    job_failed: "失败",
    element_idle: "空闲",
    element_active: "工作中",
    element_fault: "故障",
    data_loading: "加载中",
    data_empty: "暂无数据",
    data_failed: "获取失败",
    col_id: "编号",
    col_name: "名称",
    col_priority: "优先级",
    col_resource: "资源",
    col_status: "状态",
    col_created: "创建时间",
    priority_high: "高",
    priority_medium: "中",
    priority_low: "低",
    default_resource: "天线阵列",
    legend: "图例",
    ramp: "幅度 0-100",
    detail_element: "阵元",
    detail_status: "状态",
    detail_amplitude: "幅度",
    detail_phase: "相位",
    detail_code: "编码",
    detail_job: "任务",
    grid_too_small: "窗口太小，无法显示阵列",
    activity: "最近事件",
    no_activity: "尚未收到事件",
    help_title: "操作",
    help_modes: "1/2/3    切换视图（总览/阵列/任务）",
    help_tab: "Tab      循环切换视图",
    help_cursor: "方向键   移动阵列光标（或 hjkl）",
    help_reload: "r        重新加载快照",
    help_reconnect: "c        重新连接数据流",
    help_quit: "q        退出",
    note_ready: "就绪（? 帮助）",
    note_reloading: "正在重新加载快照",
    note_reloaded: "快照已加载",
    note_reconnecting: "正在重新连接数据流",
};
